//! Framework types the model knows about without reading their metadata
//!
//! Both backends consult this table for types that are not declared in the
//! modeled assembly or compilation: collections, tasks, the result envelopes,
//! ORM base types and the runtime types that methods may inject.

use coalesce_core::{PrimitiveKind, TypeKind};

/// Fully-qualified names used throughout the model
pub mod names {
    pub const NULLABLE: &str = "System.Nullable";
    pub const OBJECT: &str = "System.Object";
    pub const VOID: &str = "System.Void";
    pub const BYTE: &str = "System.Byte";
    pub const STRING: &str = "System.String";

    pub const IENUMERABLE: &str = "System.Collections.Generic.IEnumerable";
    pub const ICOLLECTION: &str = "System.Collections.Generic.ICollection";
    pub const ILIST: &str = "System.Collections.Generic.IList";
    pub const LIST: &str = "System.Collections.Generic.List";
    pub const IREADONLY_COLLECTION: &str = "System.Collections.Generic.IReadOnlyCollection";
    pub const IREADONLY_LIST: &str = "System.Collections.Generic.IReadOnlyList";
    pub const HASH_SET: &str = "System.Collections.Generic.HashSet";
    pub const ISET: &str = "System.Collections.Generic.ISet";
    pub const COLLECTION: &str = "System.Collections.ObjectModel.Collection";
    pub const DICTIONARY: &str = "System.Collections.Generic.Dictionary";
    pub const IDICTIONARY: &str = "System.Collections.Generic.IDictionary";
    pub const IQUERYABLE: &str = "System.Linq.IQueryable";
    pub const IORDERED_QUERYABLE: &str = "System.Linq.IOrderedQueryable";

    pub const TASK: &str = "System.Threading.Tasks.Task";
    pub const VALUE_TASK: &str = "System.Threading.Tasks.ValueTask";
    pub const CANCELLATION_TOKEN: &str = "System.Threading.CancellationToken";
    pub const CLAIMS_PRINCIPAL: &str = "System.Security.Claims.ClaimsPrincipal";

    pub const DB_CONTEXT: &str = "Microsoft.EntityFrameworkCore.DbContext";
    pub const DB_SET: &str = "Microsoft.EntityFrameworkCore.DbSet";

    pub const CRUD_CONTEXT: &str = "IntelliTect.Coalesce.CrudContext";
    pub const INCLUDE_TREE: &str = "IntelliTect.Coalesce.IncludeTree";
    pub const STANDARD_DATA_SOURCE: &str = "IntelliTect.Coalesce.StandardDataSource";
    pub const STANDARD_BEHAVIORS: &str = "IntelliTect.Coalesce.StandardBehaviors";
    pub const IDATA_SOURCE: &str = "IntelliTect.Coalesce.IDataSource";
    pub const IBEHAVIORS: &str = "IntelliTect.Coalesce.IBehaviors";
    pub const IPROPERTY_RESTRICTION: &str = "IntelliTect.Coalesce.IPropertyRestriction";
    pub const ITEM_RESULT: &str = "IntelliTect.Coalesce.Models.ItemResult";
    pub const LIST_RESULT: &str = "IntelliTect.Coalesce.Models.ListResult";
    pub const API_RESULT: &str = "IntelliTect.Coalesce.Models.ApiResult";
    pub const IFILE: &str = "IntelliTect.Coalesce.Models.IFile";
}

/// A framework type known by name
#[derive(Debug, Clone, Copy)]
pub struct WellKnownType {
    pub full_name: &'static str,
    pub kind: TypeKind,
    /// Generic definitions this type implements with the same type arguments
    pub implements: &'static [&'static str],
}

const SEQUENCE: &[&str] = &[names::IENUMERABLE];
const COLLECTION: &[&str] = &[
    names::ICOLLECTION,
    names::IENUMERABLE,
    names::IREADONLY_COLLECTION,
];
const LIST: &[&str] = &[
    names::ILIST,
    names::ICOLLECTION,
    names::IENUMERABLE,
    names::IREADONLY_COLLECTION,
    names::IREADONLY_LIST,
];
const SET: &[&str] = &[
    names::ISET,
    names::ICOLLECTION,
    names::IENUMERABLE,
    names::IREADONLY_COLLECTION,
];
const QUERYABLE: &[&str] = &[names::IQUERYABLE, names::IENUMERABLE];

const fn class(full_name: &'static str, implements: &'static [&'static str]) -> WellKnownType {
    WellKnownType {
        full_name,
        kind: TypeKind::Class,
        implements,
    }
}

const fn interface(full_name: &'static str, implements: &'static [&'static str]) -> WellKnownType {
    WellKnownType {
        full_name,
        kind: TypeKind::Interface,
        implements,
    }
}

const fn structure(full_name: &'static str) -> WellKnownType {
    WellKnownType {
        full_name,
        kind: TypeKind::Struct,
        implements: &[],
    }
}

static TABLE: &[WellKnownType] = &[
    structure(names::NULLABLE),
    interface(names::IENUMERABLE, &[]),
    interface(names::ICOLLECTION, SEQUENCE),
    interface(names::IREADONLY_COLLECTION, SEQUENCE),
    interface(names::IREADONLY_LIST, &[names::IREADONLY_COLLECTION, names::IENUMERABLE]),
    interface(names::ILIST, COLLECTION),
    interface(names::ISET, COLLECTION),
    class(names::LIST, LIST),
    class(names::HASH_SET, SET),
    class(names::COLLECTION, LIST),
    class(names::DICTIONARY, &[names::IDICTIONARY]),
    interface(names::IDICTIONARY, &[]),
    interface(names::IQUERYABLE, SEQUENCE),
    interface(names::IORDERED_QUERYABLE, QUERYABLE),
    class(names::TASK, &[]),
    structure(names::VALUE_TASK),
    structure(names::CANCELLATION_TOKEN),
    class(names::CLAIMS_PRINCIPAL, &[]),
    class(names::DB_CONTEXT, &[]),
    class(names::DB_SET, QUERYABLE),
    class(names::CRUD_CONTEXT, &[]),
    class(names::INCLUDE_TREE, &[]),
    class(names::STANDARD_DATA_SOURCE, &[names::IDATA_SOURCE]),
    class(names::STANDARD_BEHAVIORS, &[names::IBEHAVIORS]),
    interface(names::IDATA_SOURCE, &[]),
    interface(names::IBEHAVIORS, &[]),
    interface(names::IPROPERTY_RESTRICTION, &[]),
    class(names::API_RESULT, &[]),
    class(names::ITEM_RESULT, &[names::API_RESULT]),
    class(names::LIST_RESULT, &[names::API_RESULT]),
    interface(names::IFILE, &[]),
];

/// Look up a framework type by fully-qualified name, primitives included
pub fn lookup(full_name: &str) -> Option<WellKnownType> {
    if let Some(primitive) = PrimitiveKind::from_full_name(full_name) {
        let kind = match primitive {
            PrimitiveKind::String | PrimitiveKind::Object => TypeKind::Class,
            PrimitiveKind::Void => TypeKind::Void,
            _ => TypeKind::Struct,
        };
        return Some(WellKnownType {
            full_name: primitive.full_name(),
            kind,
            implements: &[],
        });
    }
    TABLE.iter().copied().find(|t| t.full_name == full_name)
}

/// Whether a well-known type is, or implements, `definition`
pub fn implements(full_name: &str, definition: &str) -> bool {
    if full_name == definition {
        return true;
    }
    lookup(full_name)
        .map(|t| t.implements.contains(&definition))
        .unwrap_or(false)
}

/// Generic arguments of `definition` as implemented by a well-known type
/// constructed with `args`. Implemented generic interfaces share the type's
/// own arguments; non-generic bases carry none.
pub fn implemented_arguments<T: Clone>(full_name: &str, definition: &str, args: &[T]) -> Option<Vec<T>> {
    if full_name == definition {
        return Some(args.to_vec());
    }
    if !implements(full_name, definition) {
        return None;
    }
    match definition {
        names::API_RESULT => Some(Vec::new()),
        _ => Some(args.to_vec()),
    }
}

/// Array types implement the generic collection interfaces of their element
pub fn array_implements(definition: &str) -> bool {
    LIST.contains(&definition)
}

/// Simple names that resolve without a `using` directive in the symbol binder
pub fn is_known(full_name: &str) -> bool {
    lookup(full_name).is_some()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_primitives_and_collections() {
        assert_eq!(lookup("System.Int32").map(|t| t.kind), Some(TypeKind::Struct));
        assert_eq!(lookup("System.String").map(|t| t.kind), Some(TypeKind::Class));
        assert_eq!(
            lookup(names::ICOLLECTION).map(|t| t.kind),
            Some(TypeKind::Interface)
        );
        assert!(lookup("MyProject.Person").is_none());
    }

    #[test]
    fn test_implements() {
        assert!(implements(names::LIST, names::IENUMERABLE));
        assert!(implements(names::DB_SET, names::IQUERYABLE));
        assert!(implements(names::ICOLLECTION, names::ICOLLECTION));
        assert!(!implements(names::DICTIONARY, names::IENUMERABLE));
        assert!(!implements(names::TASK, names::IENUMERABLE));
        assert!(array_implements(names::IENUMERABLE));
    }

    #[test]
    fn test_implemented_arguments() {
        assert_eq!(
            implemented_arguments(names::LIST, names::IENUMERABLE, &["T"]),
            Some(vec!["T"])
        );
        assert_eq!(
            implemented_arguments(names::ITEM_RESULT, names::API_RESULT, &["T"]),
            Some(vec![])
        );
        assert_eq!(implemented_arguments(names::TASK, names::IENUMERABLE, &["T"]), None);
    }
}
