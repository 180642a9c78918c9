//! # C# Generators
//!
//! String-built C# for the web project:
//!
//! | Generator | Output |
//! |-----------|--------|
//! | [`ClassDto`] | `Models/Generated/<Name>DtoGen.g.cs` |
//! | [`ModelApiController`] | `Api/Generated/<Name>Controller.g.cs` |
//! | [`ServiceApiController`] | `Api/Generated/<Service>Controller.g.cs` |
//!
//! Output is re-indented by [`format_csharp`](crate::format::format_csharp),
//! so builders here only care about line structure.

pub mod controllers;
pub mod dto;

pub use controllers::{ModelApiController, ServiceApiController};
pub use dto::ClassDto;

use coalesce_core::SecurityPermissionLevel;
use coalesce_model::security::SecurityPermission;
use coalesce_model::{PropertyViewModel, ReflectionRepository, TypeViewModel};

/// Default directory of generated DTOs inside the web project
pub const DTO_DIRECTORY: &str = "Models/Generated";

/// Default directory of generated controllers inside the web project
pub const API_DIRECTORY: &str = "Api/Generated";

/// Suffix of every generated C# file
pub const GENERATED_SUFFIX: &str = ".g.cs";

/// A C# regular string literal
pub fn string_literal(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{}\"", value.replace('"', "\\\"")))
}

/// The C# type of a DTO member mirroring `ty`
///
/// Model types become their DTOs; plain value types become nullable so that
/// absent members can be told apart from defaults.
pub fn dto_member_type(ty: &TypeViewModel, dto_namespace: &str, repo: &ReflectionRepository) -> String {
    let rendered = ty.dto_full_name(dto_namespace, repo);
    if ty.is_reference_or_nullable_value() {
        rendered
    } else {
        format!("{}?", rendered)
    }
}

/// Condition that is true when the user holds one of the permission's roles
pub fn role_condition(permission: &SecurityPermission) -> Option<String> {
    if !permission.has_roles() {
        return None;
    }
    let checks: Vec<String> = permission
        .roles
        .iter()
        .map(|role| format!("context.IsInRoleCached({})", string_literal(role)))
        .collect();
    Some(format!("({})", checks.join(" || ")))
}

/// ASP.NET authorization attribute for a permission; `None` for `DenyAll`
pub fn authorize_attribute(permission: &SecurityPermission) -> Option<String> {
    match permission.level {
        SecurityPermissionLevel::DenyAll => None,
        SecurityPermissionLevel::AllowAll => Some("[AllowAnonymous]".to_string()),
        SecurityPermissionLevel::AllowAuthenticated if permission.has_roles() => Some(format!(
            "[Authorize(Roles = {})]",
            string_literal(&permission.roles.join(","))
        )),
        SecurityPermissionLevel::AllowAuthenticated => Some("[Authorize]".to_string()),
    }
}

/// Content-view condition from `[DtoIncludes]` / `[DtoExcludes]`
pub fn includes_condition(prop: &PropertyViewModel) -> Option<String> {
    let any_of = |views: &[String]| {
        views
            .iter()
            .map(|v| format!("includes == {}", string_literal(v)))
            .collect::<Vec<_>>()
            .join(" || ")
    };
    let mut parts = Vec::new();
    if !prop.dto_includes.is_empty() {
        parts.push(format!("({})", any_of(&prop.dto_includes)));
    }
    if !prop.dto_excludes.is_empty() {
        parts.push(format!("!({})", any_of(&prop.dto_excludes)));
    }
    (!parts.is_empty()).then(|| parts.join(" && "))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use coalesce_model::testing;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_string_literal_escapes() {
        assert_eq!(string_literal("Admin"), "\"Admin\"");
        assert_eq!(string_literal("a \"b\"\n"), "\"a \\\"b\\\"\\n\"");
    }

    #[test]
    fn test_dto_member_types() {
        for fixture in testing::both() {
            let repo = &fixture.repo;
            let ns = "MyProject.Web.Models";
            let cases = [
                ("Person", "PersonId", "int?"),
                ("Person", "FirstName", "string"),
                ("Person", "CompanyId", "int?"),
                ("Person", "Company", "MyProject.Web.Models.CompanyDtoGen"),
                (
                    "Person",
                    "CasesAssigned",
                    "System.Collections.Generic.ICollection<MyProject.Web.Models.CaseDtoGen>",
                ),
                ("Case", "Status", "MyProject.Models.Statuses?"),
                ("ComplexModel", "Bytes", "byte[]"),
            ];
            for (class, prop, expected) in cases {
                let ty = fixture.property_type(class, prop);
                assert_eq!(dto_member_type(&ty, ns, repo), expected, "{}.{}", class, prop);
            }
        }
    }

    #[test]
    fn test_security_rendering() {
        let repo = &testing::both()[0].repo;
        let case = repo.require_class("Case").unwrap();
        assert_eq!(
            authorize_attribute(&case.security.create).as_deref(),
            Some("[Authorize(Roles = \"Admin\")]")
        );
        assert_eq!(authorize_attribute(&case.security.delete), None);
        assert_eq!(authorize_attribute(&case.security.read).as_deref(), Some("[Authorize]"));

        let product = repo.require_class("Product").unwrap();
        assert_eq!(authorize_attribute(&product.security.read).as_deref(), Some("[AllowAnonymous]"));

        let complex = repo.require_class("ComplexModel").unwrap();
        let readable = complex.property("AdminReadable").unwrap();
        assert_eq!(
            role_condition(&readable.security.read).as_deref(),
            Some("(context.IsInRoleCached(\"Admin\"))")
        );
        assert_eq!(role_condition(&complex.security.read), None);
    }
}
