//! Shared model fixtures
//!
//! The same model is described twice: as C# source for the symbol backend and
//! as hand-built [`AssemblyMetadata`] for the reflection backend. Tests run
//! their assertions against both and expect identical answers.

use std::sync::{Arc, LazyLock};

use coalesce_core::PrimitiveKind;

use crate::reflection::{
    AssemblyMetadata, AttributeArg, AttributeMetadata, ClrType, MethodMetadata, ParameterMetadata,
    PropertyMetadata, TypeMetadata,
};
use crate::repository::ReflectionRepository;
use crate::symbol::Compilation;
use crate::type_info::Backend;
use crate::type_view_model::TypeViewModel;
use crate::well_known::names;

/// One backend's view of a fixture model
pub struct ModelFixture {
    pub backend: Backend,
    pub repo: Arc<ReflectionRepository>,
}

impl ModelFixture {
    pub fn reflection(assembly: &AssemblyMetadata) -> Self {
        let mut repo = ReflectionRepository::new();
        repo.add_assembly(assembly)
            .expect("fixture assembly should discover");
        Self {
            backend: Backend::Reflection,
            repo: Arc::new(repo),
        }
    }

    pub fn symbol(compilation: &Arc<Compilation>) -> Self {
        let mut repo = ReflectionRepository::new();
        repo.add_compilation(compilation)
            .expect("fixture compilation should discover");
        Self {
            backend: Backend::Symbol,
            repo: Arc::new(repo),
        }
    }

    /// Declared type of `class.property`
    pub fn property_type(&self, class: &str, property: &str) -> TypeViewModel {
        let class = self
            .repo
            .require_class(class)
            .unwrap_or_else(|e| panic!("{} ({}): {}", class, self.backend, e));
        class
            .property(property)
            .unwrap_or_else(|| panic!("{}.{} ({})", class.name, property, self.backend))
            .type_vm
            .clone()
    }
}

static BOTH: LazyLock<[ModelFixture; 2]> = LazyLock::new(|| {
    [
        ModelFixture::reflection(&assembly()),
        ModelFixture::symbol(&compilation()),
    ]
});

static COLLISION: LazyLock<[ModelFixture; 2]> = LazyLock::new(|| {
    [
        ModelFixture::reflection(&collision_assembly()),
        ModelFixture::symbol(&collision_compilation()),
    ]
});

/// The main fixture model: `[reflection, symbol]`
pub fn both() -> &'static [ModelFixture; 2] {
    &BOTH
}

/// Entities whose namespace contains one of their own class names
pub fn namespace_collision() -> &'static [ModelFixture; 2] {
    &COLLISION
}

// ============================================================================
// Symbol fixture
// ============================================================================

pub const MODELS_CS: &str = r#"
using System.ComponentModel.DataAnnotations;
using System.ComponentModel.DataAnnotations.Schema;
using System.Security.Claims;
using IntelliTect.Coalesce;
using IntelliTect.Coalesce.DataAnnotations;
using IntelliTect.Coalesce.Models;
using MyProject.Services;

namespace MyProject.Models
{
    public enum Statuses
    {
        Open,
        InProgress,
        Resolved,
        ClosedNoSolution,
        Cancelled = 99
    }

    public class Person
    {
        public int PersonId { get; set; }

        [Required, MaxLength(75)]
        [DefaultOrderBy(FieldOrder = 1)]
        public string FirstName { get; set; }

        [DefaultOrderBy(FieldOrder = 0)]
        public string LastName { get; set; }

        [InternalUse]
        public string SecretNote { get; set; }

        public int? CompanyId { get; set; }
        public Company Company { get; set; }

        [InverseProperty("AssignedTo")]
        public ICollection<Case> CasesAssigned { get; set; }

        [InverseProperty("ReportedBy")]
        public ICollection<Case> CasesReported { get; set; }

        [Coalesce, LoadFromDataSource(typeof(BorCPeople))]
        public Person Rename(string name)
        {
            FirstName = name;
            return this;
        }
    }

    [SemanticKernel("Companies and where they are located")]
    public class Company
    {
        public int CompanyId { get; set; }

        [Search(SearchMethod = SearchAttribute.SearchMethods.Contains)]
        public string Name { get; set; }

        public string City { get; set; }

        [Search(SearchMethod = SearchAttribute.SearchMethods.Contains)]
        public string LogoUrl { get; set; }

        public ICollection<Person> Employees { get; set; }
    }

    [Create(Roles = "Admin")]
    [Delete(SecurityPermissionLevels.DenyAll)]
    public class Case
    {
        [Key]
        public int CaseKey { get; set; }

        public string Title { get; set; }

        public Statuses Status { get; set; }

        [DefaultOrderBy(FieldOrder = 1, OrderByDirection = DefaultOrderByAttribute.OrderByDirections.Descending)]
        public DateTimeOffset OpenedAt { get; set; }

        public int? AssignedToId { get; set; }

        [ForeignKey("AssignedToId")]
        [DefaultOrderBy(FieldOrder = 0)]
        public Person AssignedTo { get; set; }

        public int? ReportedById { get; set; }

        [ForeignKey(nameof(ReportedById))]
        public Person ReportedBy { get; set; }

        [ManyToMany("Products")]
        public ICollection<CaseProduct> CaseProducts { get; set; }
    }

    [Read(SecurityPermissionLevels.AllowAll)]
    [SemanticKernel("Products that cases can be filed against")]
    [Index(nameof(UniqueId1), IsUnique = true)]
    public class Product
    {
        public int ProductId { get; set; }

        [Display(Name = "ID1")]
        public string UniqueId1 { get; set; }

        [ListText]
        public string Name { get; set; }
    }

    public class CaseProduct
    {
        public int CaseProductId { get; set; }

        public int CaseId { get; set; }

        [ForeignKey(nameof(CaseId))]
        public Case Case { get; set; }

        public int ProductId { get; set; }

        [DefaultOrderBy]
        public Product Product { get; set; }
    }

    public class ComplexModelRestriction : IPropertyRestriction
    {
    }

    public class ComplexModel
    {
        public int ComplexModelId { get; set; }
        public int? NullableInt { get; set; }
        public bool Bool { get; set; }
        public string String { get; set; }
        public ICollection<bool?> NullableBoolCollection { get; set; }
        public bool[] BoolArray { get; set; }
        public byte[] Bytes { get; set; }
        public DateOnly DateOnly { get; set; }
        public TimeOnly TimeOnly { get; set; }
        public DateTimeOffset? DateTimeOffsetNullable { get; set; }
        public Statuses EnumValue { get; set; }
        public Guid Guid { get; set; }
        public List<string> StringList { get; set; }

        [Range(1, 100)]
        public int RangeValue { get; set; }

        public string InitOnly { get; init; }
        public string ReadOnly { get; }
        public string PrivateSet { get; private set; }

        [Read(Roles = "Admin")]
        public string AdminReadable { get; set; }

        [Edit(Roles = "Admin")]
        public string AdminEditable { get; set; }

        [Restrict(typeof(ComplexModelRestriction))]
        public string RestrictedString { get; set; }

        [ListGroup("Group1")]
        public string Grouped { get; set; }

        [Coalesce]
        public ItemResult<ICollection<Person>> MethodWithManyParams(
            AppDbContext db,
            ClaimsPrincipal user,
            [Inject] IWeatherService weather,
            int id,
            string name,
            CancellationToken cancellationToken)
        {
            return true;
        }

        [Coalesce]
        public static Task<ListResult<Person>> StaticListMethod(AppDbContext db, string filter)
        {
            return null;
        }

        [Coalesce]
        public void VoidMethod()
        {
        }

        [Coalesce, ControllerAction(HttpMethod.Get)]
        public string GetMethod()
        {
            return String;
        }

        [Coalesce]
        public ItemResult<Person> WithIncludeTree(AppDbContext db, out IncludeTree includeTree)
        {
            includeTree = null;
            return true;
        }

        [Coalesce, Execute(Roles = "Admin")]
        public void AdminMethod()
        {
        }

        [Coalesce, ReferencedType(typeof(AttributeOnlyType))]
        public void MethodWithAttributeReference()
        {
        }

        public void NotExposed()
        {
        }
    }

    [Coalesce, StandaloneEntity]
    public class StandaloneReport
    {
        public int Id { get; set; }
        public string Title { get; set; }
        public DateTimeOffset GeneratedAt { get; set; }
    }

    public class WeatherData
    {
        public double TempFahrenheit { get; set; }
        public string Location { get; set; }
    }

    public class AttributeOnlyType
    {
        public string Value { get; set; }
    }
}
"#;

pub const STRATEGIES_CS: &str = r#"
using IntelliTect.Coalesce;

namespace MyProject.Models
{
    [Coalesce]
    public class BorCPeople : StandardDataSource<Person, AppDbContext>
    {
        [Coalesce]
        public string Letter { get; set; }
    }

    [Coalesce]
    public class CaseBehaviors : StandardBehaviors<Case, AppDbContext>
    {
    }
}
"#;

pub const DB_CONTEXT_CS: &str = r#"
using Microsoft.EntityFrameworkCore;

namespace MyProject.Models
{
    public class AppDbContext : DbContext
    {
        public DbSet<Person> People { get; set; }
        public DbSet<Case> Cases { get; set; }
        public DbSet<Company> Companies { get; set; }
        public DbSet<Product> Products { get; set; }
        public DbSet<CaseProduct> CaseProducts { get; set; }
        public DbSet<ComplexModel> ComplexModels { get; set; }
    }
}
"#;

pub const SERVICES_CS: &str = r#"
using IntelliTect.Coalesce;
using MyProject.Models;

namespace MyProject.Services
{
    [Coalesce, Service]
    public interface IWeatherService
    {
        WeatherData GetWeather(string location, DateTimeOffset? dateTime = null);

        Task<WeatherData> GetWeatherAsync(string location);
    }
}
"#;

pub const COLLISION_CS: &str = r#"
using Microsoft.EntityFrameworkCore;

namespace MyProject.Test.Models
{
    public class Test
    {
        public int TestId { get; set; }
        public string Name { get; set; }
    }

    public class Holder
    {
        public int HolderId { get; set; }
        public ICollection<Test> Tests { get; set; }
    }

    public class TestDbContext : DbContext
    {
        public DbSet<Test> Tests { get; set; }
        public DbSet<Holder> Holders { get; set; }
    }
}
"#;

/// The main fixture as `(path, text)` source files
pub fn sources() -> Vec<(&'static str, &'static str)> {
    vec![
        ("Models/Models.cs", MODELS_CS),
        ("Models/Strategies.cs", STRATEGIES_CS),
        ("Models/AppDbContext.cs", DB_CONTEXT_CS),
        ("Services/WeatherService.cs", SERVICES_CS),
    ]
}

pub fn compilation() -> Arc<Compilation> {
    Compilation::from_sources(sources()).expect("fixture sources should bind")
}

fn collision_compilation() -> Arc<Compilation> {
    Compilation::from_sources([("Test.cs", COLLISION_CS)]).expect("collision sources should bind")
}

// ============================================================================
// Reflection fixture
// ============================================================================

const MODELS: &str = "MyProject.Models";
const SERVICES: &str = "MyProject.Services";

fn model(name: &str) -> ClrType {
    ClrType::named(format!("{}.{}", MODELS, name))
}

fn prim(kind: PrimitiveKind) -> ClrType {
    ClrType::primitive(kind)
}

fn prop(name: &str, ty: ClrType) -> PropertyMetadata {
    PropertyMetadata::new(name, ty)
}

fn attr(name: &str) -> AttributeMetadata {
    AttributeMetadata::new(name)
}

fn order_by(field_order: i64) -> AttributeMetadata {
    attr("DefaultOrderBy").named("FieldOrder", field_order)
}

fn search_contains() -> AttributeMetadata {
    attr("Search").named(
        "SearchMethod",
        AttributeArg::enum_member("SearchAttribute.SearchMethods", "Contains"),
    )
}

fn db_context() -> ParameterMetadata {
    ParameterMetadata::new("db", model("AppDbContext"))
}

/// The main fixture, equivalent to [`sources`]
pub fn assembly() -> AssemblyMetadata {
    let statuses = TypeMetadata::enumeration(MODELS, "Statuses")
        .with_enum_member("Open", 0)
        .with_enum_member("InProgress", 1)
        .with_enum_member("Resolved", 2)
        .with_enum_member("ClosedNoSolution", 3)
        .with_enum_member("Cancelled", 99);

    let person = TypeMetadata::class(MODELS, "Person")
        .with_property(prop("PersonId", ClrType::int()))
        .with_property(
            prop("FirstName", ClrType::string())
                .with_attribute(attr("Required"))
                .with_attribute(attr("MaxLength").arg(75))
                .with_attribute(order_by(1)),
        )
        .with_property(prop("LastName", ClrType::string()).with_attribute(order_by(0)))
        .with_property(prop("SecretNote", ClrType::string()).with_attribute(attr("InternalUse")))
        .with_property(prop("CompanyId", ClrType::nullable(ClrType::int())))
        .with_property(prop("Company", model("Company")))
        .with_property(
            prop("CasesAssigned", ClrType::collection(model("Case")))
                .with_attribute(attr("InverseProperty").arg("AssignedTo")),
        )
        .with_property(
            prop("CasesReported", ClrType::collection(model("Case")))
                .with_attribute(attr("InverseProperty").arg("ReportedBy")),
        )
        .with_method(
            MethodMetadata::new("Rename", model("Person"))
                .with_parameter(ParameterMetadata::new("name", ClrType::string()))
                .with_attribute(attr("Coalesce"))
                .with_attribute(attr("LoadFromDataSource").arg(AttributeArg::Type(model("BorCPeople")))),
        );

    let company = TypeMetadata::class(MODELS, "Company")
        .with_attribute(attr("SemanticKernel").arg("Companies and where they are located"))
        .with_property(prop("CompanyId", ClrType::int()))
        .with_property(prop("Name", ClrType::string()).with_attribute(search_contains()))
        .with_property(prop("City", ClrType::string()))
        .with_property(prop("LogoUrl", ClrType::string()).with_attribute(search_contains()))
        .with_property(prop("Employees", ClrType::collection(model("Person"))));

    let case = TypeMetadata::class(MODELS, "Case")
        .with_attribute(attr("Create").named("Roles", "Admin"))
        .with_attribute(
            attr("Delete").arg(AttributeArg::enum_member("SecurityPermissionLevels", "DenyAll")),
        )
        .with_property(prop("CaseKey", ClrType::int()).with_attribute(attr("Key")))
        .with_property(prop("Title", ClrType::string()))
        .with_property(prop("Status", model("Statuses")))
        .with_property(
            prop("OpenedAt", prim(PrimitiveKind::DateTimeOffset)).with_attribute(
                order_by(1).named(
                    "OrderByDirection",
                    AttributeArg::enum_member("DefaultOrderByAttribute.OrderByDirections", "Descending"),
                ),
            ),
        )
        .with_property(prop("AssignedToId", ClrType::nullable(ClrType::int())))
        .with_property(
            prop("AssignedTo", model("Person"))
                .with_attribute(attr("ForeignKey").arg("AssignedToId"))
                .with_attribute(order_by(0)),
        )
        .with_property(prop("ReportedById", ClrType::nullable(ClrType::int())))
        .with_property(
            prop("ReportedBy", model("Person")).with_attribute(attr("ForeignKey").arg("ReportedById")),
        )
        .with_property(
            prop("CaseProducts", ClrType::collection(model("CaseProduct")))
                .with_attribute(attr("ManyToMany").arg("Products")),
        );

    let product = TypeMetadata::class(MODELS, "Product")
        .with_attribute(attr("SemanticKernel").arg("Products that cases can be filed against"))
        .with_attribute(
            attr("Read").arg(AttributeArg::enum_member("SecurityPermissionLevels", "AllowAll")),
        )
        .with_attribute(attr("Index").arg("UniqueId1").named("IsUnique", true))
        .with_property(prop("ProductId", ClrType::int()))
        .with_property(
            prop("UniqueId1", ClrType::string()).with_attribute(attr("Display").named("Name", "ID1")),
        )
        .with_property(prop("Name", ClrType::string()).with_attribute(attr("ListText")));

    let case_product = TypeMetadata::class(MODELS, "CaseProduct")
        .with_property(prop("CaseProductId", ClrType::int()))
        .with_property(prop("CaseId", ClrType::int()))
        .with_property(prop("Case", model("Case")).with_attribute(attr("ForeignKey").arg("CaseId")))
        .with_property(prop("ProductId", ClrType::int()))
        .with_property(prop("Product", model("Product")).with_attribute(attr("DefaultOrderBy")));

    let restriction = TypeMetadata::class(MODELS, "ComplexModelRestriction")
        .with_interface(ClrType::named(names::IPROPERTY_RESTRICTION));

    let complex = TypeMetadata::class(MODELS, "ComplexModel")
        .with_property(prop("ComplexModelId", ClrType::int()))
        .with_property(prop("NullableInt", ClrType::nullable(ClrType::int())))
        .with_property(prop("Bool", ClrType::bool()))
        .with_property(prop("String", ClrType::string()))
        .with_property(prop(
            "NullableBoolCollection",
            ClrType::collection(ClrType::nullable(ClrType::bool())),
        ))
        .with_property(prop("BoolArray", ClrType::array(ClrType::bool())))
        .with_property(prop("Bytes", ClrType::array(prim(PrimitiveKind::Byte))))
        .with_property(prop("DateOnly", prim(PrimitiveKind::DateOnly)))
        .with_property(prop("TimeOnly", prim(PrimitiveKind::TimeOnly)))
        .with_property(prop(
            "DateTimeOffsetNullable",
            ClrType::nullable(prim(PrimitiveKind::DateTimeOffset)),
        ))
        .with_property(prop("EnumValue", model("Statuses")))
        .with_property(prop("Guid", prim(PrimitiveKind::Guid)))
        .with_property(prop("StringList", ClrType::list(ClrType::string())))
        .with_property(
            prop("RangeValue", ClrType::int()).with_attribute(attr("Range").arg(1).arg(100)),
        )
        .with_property(prop("InitOnly", ClrType::string()).init_only())
        .with_property(prop("ReadOnly", ClrType::string()).read_only())
        .with_property(prop("PrivateSet", ClrType::string()).read_only())
        .with_property(
            prop("AdminReadable", ClrType::string()).with_attribute(attr("Read").named("Roles", "Admin")),
        )
        .with_property(
            prop("AdminEditable", ClrType::string()).with_attribute(attr("Edit").named("Roles", "Admin")),
        )
        .with_property(
            prop("RestrictedString", ClrType::string())
                .with_attribute(attr("Restrict").arg(AttributeArg::Type(model("ComplexModelRestriction")))),
        )
        .with_property(prop("Grouped", ClrType::string()).with_attribute(attr("ListGroup").arg("Group1")))
        .with_method(
            MethodMetadata::new(
                "MethodWithManyParams",
                ClrType::item_result(Some(ClrType::collection(model("Person")))),
            )
            .with_attribute(attr("Coalesce"))
            .with_parameter(db_context())
            .with_parameter(ParameterMetadata::new("user", ClrType::named(names::CLAIMS_PRINCIPAL)))
            .with_parameter(
                ParameterMetadata::new(
                    "weather",
                    ClrType::named(format!("{}.IWeatherService", SERVICES)),
                )
                .with_attribute(attr("Inject")),
            )
            .with_parameter(ParameterMetadata::new("id", ClrType::int()))
            .with_parameter(ParameterMetadata::new("name", ClrType::string()))
            .with_parameter(ParameterMetadata::new(
                "cancellationToken",
                ClrType::named(names::CANCELLATION_TOKEN),
            )),
        )
        .with_method(
            MethodMetadata::new(
                "StaticListMethod",
                ClrType::task(ClrType::list_result(model("Person"))),
            )
            .into_static()
            .with_attribute(attr("Coalesce"))
            .with_parameter(db_context())
            .with_parameter(ParameterMetadata::new("filter", ClrType::string())),
        )
        .with_method(MethodMetadata::new("VoidMethod", ClrType::void()).with_attribute(attr("Coalesce")))
        .with_method(
            MethodMetadata::new("GetMethod", ClrType::string())
                .with_attribute(attr("Coalesce"))
                .with_attribute(
                    attr("ControllerAction").arg(AttributeArg::enum_member("HttpMethod", "Get")),
                ),
        )
        .with_method(
            MethodMetadata::new("WithIncludeTree", ClrType::item_result(Some(model("Person"))))
                .with_attribute(attr("Coalesce"))
                .with_parameter(db_context())
                .with_parameter(
                    ParameterMetadata::new("includeTree", ClrType::named(names::INCLUDE_TREE)).out(),
                ),
        )
        .with_method(
            MethodMetadata::new("AdminMethod", ClrType::void())
                .with_attribute(attr("Coalesce"))
                .with_attribute(attr("Execute").named("Roles", "Admin")),
        )
        .with_method(
            MethodMetadata::new("MethodWithAttributeReference", ClrType::void())
                .with_attribute(attr("Coalesce"))
                .with_attribute(
                    attr("ReferencedType").arg(AttributeArg::Type(model("AttributeOnlyType"))),
                ),
        )
        .with_method(MethodMetadata::new("NotExposed", ClrType::void()));

    let standalone = TypeMetadata::class(MODELS, "StandaloneReport")
        .with_attribute(attr("Coalesce"))
        .with_attribute(attr("StandaloneEntity"))
        .with_property(prop("Id", ClrType::int()))
        .with_property(prop("Title", ClrType::string()))
        .with_property(prop("GeneratedAt", prim(PrimitiveKind::DateTimeOffset)));

    let weather_data = TypeMetadata::class(MODELS, "WeatherData")
        .with_property(prop("TempFahrenheit", prim(PrimitiveKind::Double)))
        .with_property(prop("Location", ClrType::string()));

    let attribute_only = TypeMetadata::class(MODELS, "AttributeOnlyType")
        .with_property(prop("Value", ClrType::string()));

    let data_source = TypeMetadata::class(MODELS, "BorCPeople")
        .with_attribute(attr("Coalesce"))
        .with_base(ClrType::generic(
            names::STANDARD_DATA_SOURCE,
            vec![model("Person"), model("AppDbContext")],
        ))
        .with_property(prop("Letter", ClrType::string()).with_attribute(attr("Coalesce")));

    let behaviors = TypeMetadata::class(MODELS, "CaseBehaviors")
        .with_attribute(attr("Coalesce"))
        .with_base(ClrType::generic(
            names::STANDARD_BEHAVIORS,
            vec![model("Case"), model("AppDbContext")],
        ));

    let db_set = |name: &str, entity: &str| {
        prop(name, ClrType::generic(names::DB_SET, vec![model(entity)]))
    };
    let context = TypeMetadata::class(MODELS, "AppDbContext")
        .with_base(ClrType::named(names::DB_CONTEXT))
        .with_property(db_set("People", "Person"))
        .with_property(db_set("Cases", "Case"))
        .with_property(db_set("Companies", "Company"))
        .with_property(db_set("Products", "Product"))
        .with_property(db_set("CaseProducts", "CaseProduct"))
        .with_property(db_set("ComplexModels", "ComplexModel"));

    let weather_service = TypeMetadata::interface(SERVICES, "IWeatherService")
        .with_attribute(attr("Coalesce"))
        .with_attribute(attr("Service"))
        .with_method(
            MethodMetadata::new("GetWeather", model("WeatherData"))
                .with_parameter(ParameterMetadata::new("location", ClrType::string()))
                .with_parameter(
                    ParameterMetadata::new(
                        "dateTime",
                        ClrType::nullable(prim(PrimitiveKind::DateTimeOffset)),
                    )
                    .with_default(AttributeArg::Null),
                ),
        )
        .with_method(
            MethodMetadata::new("GetWeatherAsync", ClrType::task(model("WeatherData")))
                .with_parameter(ParameterMetadata::new("location", ClrType::string())),
        );

    AssemblyMetadata::new("MyProject")
        .with_type(statuses)
        .with_type(person)
        .with_type(company)
        .with_type(case)
        .with_type(product)
        .with_type(case_product)
        .with_type(restriction)
        .with_type(complex)
        .with_type(standalone)
        .with_type(weather_data)
        .with_type(attribute_only)
        .with_type(data_source)
        .with_type(behaviors)
        .with_type(context)
        .with_type(weather_service)
}

fn collision_assembly() -> AssemblyMetadata {
    const NS: &str = "MyProject.Test.Models";
    let test = |name: &str| ClrType::named(format!("{}.{}", NS, name));
    AssemblyMetadata::new("MyProject.Test")
        .with_type(
            TypeMetadata::class(NS, "Test")
                .with_property(prop("TestId", ClrType::int()))
                .with_property(prop("Name", ClrType::string())),
        )
        .with_type(
            TypeMetadata::class(NS, "Holder")
                .with_property(prop("HolderId", ClrType::int()))
                .with_property(prop("Tests", ClrType::collection(test("Test")))),
        )
        .with_type(
            TypeMetadata::class(NS, "TestDbContext")
                .with_base(ClrType::named(names::DB_CONTEXT))
                .with_property(prop("Tests", ClrType::generic(names::DB_SET, vec![test("Test")])))
                .with_property(prop("Holders", ClrType::generic(names::DB_SET, vec![test("Holder")]))),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_fixtures_cover_both_backends() {
        for fixtures in [both(), namespace_collision()] {
            assert_eq!(fixtures[0].backend, Backend::Reflection);
            assert_eq!(fixtures[1].backend, Backend::Symbol);
        }
        for fixture in both() {
            let person = fixture.repo.require_class("Person").unwrap();
            assert_eq!(person.type_vm.backend(), fixture.backend);
            assert_eq!(fixture.property_type("Person", "Company").backend(), fixture.backend);
        }
    }
}
