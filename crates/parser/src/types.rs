//! Type descriptions and compatibility rules.
//!
//! A [`TypeInfo`] describes a declared or inferred type: base id, array
//! nesting, `optional`/`strict` decorators, union alternatives, and (inside
//! generic functions) an unresolved placeholder id. Compatibility is
//! intentionally asymmetric and always phrased as "does this declared
//! target accept that value type"; see [`TypeInfo::equals`].

use smallvec::SmallVec;
use std::fmt;

/// Fixed ids of the builtin types. User-declared object types are numbered
/// from [`type_ids::TYPE_CARET_START`] upward in declaration order.
pub mod type_ids {
    pub const INT: i32 = 0;
    pub const STRING: i32 = 1;
    pub const FLOAT: i32 = 2;
    pub const LIST: i32 = 3;
    pub const OBJECT: i32 = 4;
    pub const SELECTOR: i32 = 5;
    pub const VOID: i32 = 6;
    pub const ANY: i32 = 7;
    pub const BOOL: i32 = 8;
    pub const NULL: i32 = 9;

    /// First id handed to a user-declared object type.
    pub const TYPE_CARET_START: i32 = 10;

    /// Name used in diagnostics.
    pub fn name(id: i32) -> &'static str {
        match id {
            INT => "int",
            STRING => "string",
            FLOAT => "float",
            LIST => "list",
            OBJECT => "obj",
            SELECTOR => "selector",
            VOID => "void",
            ANY => "any",
            BOOL => "bool",
            NULL => "null",
            _ => "object",
        }
    }
}

/// Description of one type as written at a declaration site.
///
/// Structural `PartialEq`/`Hash` (derived) are what generic variation
/// caches key on; semantic compatibility goes through [`TypeInfo::equals`]
/// and is *not* symmetric.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeInfo {
    pub type_id: i32,
    pub array_count: u32,
    pub optional: bool,
    pub strict: bool,
    pub is_generic: bool,
    pub generic_id: i32,
    /// Union alternatives, e.g. the `string` in `int|string`.
    pub alternatives: Vec<TypeInfo>,
    /// Per-array-level `(optional, strict)` decorators, outermost first.
    pub array_modifiers: SmallVec<[(bool, bool); 2]>,
}

impl TypeInfo {
    pub fn new(type_id: i32) -> Self {
        TypeInfo {
            type_id,
            array_count: 0,
            optional: false,
            strict: false,
            is_generic: false,
            generic_id: -1,
            alternatives: Vec::new(),
            array_modifiers: SmallVec::new(),
        }
    }

    /// An unresolved generic parameter (`T` inside `method : <T> ...`).
    pub fn placeholder(generic_id: i32) -> Self {
        let mut info = TypeInfo::new(-1);
        info.is_generic = true;
        info.generic_id = generic_id;
        info
    }

    /// Wraps the type in one array level carrying its own decorators.
    pub fn array_of(mut self, optional: bool, strict: bool) -> Self {
        self.array_count += 1;
        self.array_modifiers.push((optional, strict));
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    pub fn is_array(&self) -> bool {
        self.array_count > 0
    }

    /// True when a *value* of type `self` may decorate down to `target`:
    /// same id and depth, a non-optional value may fill an optional slot
    /// but not the reverse, and a strict target demands a strict value.
    pub fn can_convert_to(&self, target: &TypeInfo) -> bool {
        !target.is_generic
            && target.type_id == self.type_id
            && target.array_count == self.array_count
            && decorators_convertible(
                (target.optional, target.strict),
                (self.optional, self.strict),
            )
    }

    /// Does this declared type accept a value of type `value`?
    ///
    /// Asymmetric on purpose. In order: a generic target accepts any
    /// concrete value (and another placeholder only when ids match), an
    /// optional target accepts `null`, `any` accepts anything of the same
    /// array shape, then exact match, then any declared alternative, then
    /// decorator conversion.
    pub fn equals(&self, value: &TypeInfo) -> bool {
        let aeq = self.array_count == value.array_count && self.compare_array_flags(value);

        if self.is_generic && aeq && (!value.is_generic || self.generic_id == value.generic_id) {
            return true;
        }
        if self.optional && value.type_id == type_ids::NULL {
            return true;
        }
        if self.type_id == type_ids::ANY && aeq {
            return true;
        }
        if value.type_id == self.type_id
            && aeq
            && value.optional == self.optional
            && value.strict == self.strict
        {
            return true;
        }
        if self.alternatives.iter().any(|alt| alt.equals(value)) {
            return true;
        }
        value.can_convert_to(self)
    }

    /// Scalar form of [`TypeInfo::equals`] against a bare type id.
    pub fn matches_id(&self, type_id: i32) -> bool {
        (self.is_generic && self.array_count == 0)
            || (self.type_id == type_id && self.array_count == 0)
    }

    /// Element-wise decorator check for arrays; both sides must declare a
    /// modifier pair for every level.
    pub fn compare_array_flags(&self, value: &TypeInfo) -> bool {
        if self.array_count != value.array_count {
            return false;
        }
        for level in 0..self.array_count as usize {
            let (Some(target), Some(val)) = (
                self.array_modifiers.get(level),
                value.array_modifiers.get(level),
            ) else {
                return false;
            };
            if !decorators_convertible(*target, *val) {
                return false;
            }
        }
        true
    }

    /// Friendly rendering for diagnostics: `int[]?`, `string|null`.
    /// [`fmt::Display`] stays numeric because variation hashes build on it.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        if self.is_generic {
            out.push('T');
        } else {
            out.push_str(type_ids::name(self.type_id));
        }
        if self.strict {
            out.push('!');
        }
        for alternative in &self.alternatives {
            out.push('|');
            out.push_str(&alternative.describe());
        }
        for _ in 0..self.array_count {
            out.push_str("[]");
        }
        if self.optional {
            out.push('?');
        }
        out
    }

    /// The type one array level down; identity for non-arrays.
    pub fn element_type(&self) -> TypeInfo {
        if self.array_count < 1 {
            return self.clone();
        }
        let mut element = self.clone();
        element.array_count -= 1;
        element
    }

    /// Substitutes generic placeholders with their bound concrete types.
    ///
    /// The bound type's array depth and per-level modifiers merge in front
    /// of any depth declared on the placeholder itself (`T[]` with
    /// `T = int[]` yields depth 2), and the placeholder flag clears so the
    /// specialized copy reads as a plain concrete type. Recurses into
    /// alternatives.
    pub fn resolve_generics(info: &mut TypeInfo, bindings: &[TypeInfo]) {
        if info.is_generic && info.generic_id >= 0 && (info.generic_id as usize) < bindings.len() {
            let bound = &bindings[info.generic_id as usize];
            info.type_id = bound.type_id;
            info.is_generic = false;
            info.array_count += bound.array_count;
            for (level, flags) in bound.array_modifiers.iter().enumerate() {
                info.array_modifiers.insert(level, *flags);
            }
        }
        for alternative in &mut info.alternatives {
            Self::resolve_generics(alternative, bindings);
        }
    }
}

/// `(optional, strict)` pairs: an optional value needs an optional target,
/// a strict target needs a strict value. Widening a strict value into a
/// non-strict target is allowed.
fn decorators_convertible(target: (bool, bool), value: (bool, bool)) -> bool {
    (!value.0 || target.0) && (!target.1 || value.1)
}

/// Compact signature form used to key and name generic variations,
/// e.g. `0!|1[2]?` for `(int! | string)[][]?`.
impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_id)?;
        if self.strict {
            f.write_str("!")?;
        }
        for alternative in &self.alternatives {
            write!(f, "|{alternative}")?;
        }
        if self.array_count != 0 {
            write!(f, "[{}]", self.array_count)?;
        }
        if self.optional {
            f.write_str("?")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_accepts_plain_but_not_reverse() {
        let plain = TypeInfo::new(type_ids::INT);
        let optional = TypeInfo::new(type_ids::INT).optional();

        assert!(optional.equals(&plain));
        assert!(!plain.equals(&optional));
    }

    #[test]
    fn null_satisfies_only_optional_targets() {
        let null = TypeInfo::new(type_ids::NULL);
        assert!(TypeInfo::new(type_ids::STRING).optional().equals(&null));
        assert!(!TypeInfo::new(type_ids::STRING).equals(&null));
    }

    #[test]
    fn strict_targets_demand_strict_values() {
        let strict = TypeInfo::new(type_ids::FLOAT).strict();
        let plain = TypeInfo::new(type_ids::FLOAT);

        assert!(!strict.equals(&plain));
        // Widening a strict value into a plain slot is fine.
        assert!(plain.equals(&strict));
    }

    #[test]
    fn ids_and_depth_must_align() {
        let int = TypeInfo::new(type_ids::INT);
        let string = TypeInfo::new(type_ids::STRING);
        assert!(!int.equals(&string));
        assert!(!string.equals(&int));

        let int_array = TypeInfo::new(type_ids::INT).array_of(false, false);
        assert!(!int.equals(&int_array));
        assert!(!int_array.equals(&int));
        assert!(int_array.equals(&TypeInfo::new(type_ids::INT).array_of(false, false)));
    }

    #[test]
    fn any_accepts_same_shape() {
        let any = TypeInfo::new(type_ids::ANY);
        assert!(any.equals(&TypeInfo::new(type_ids::SELECTOR)));
        assert!(!any.equals(&TypeInfo::new(type_ids::INT).array_of(false, false)));
    }

    #[test]
    fn generic_targets_accept_concrete_values() {
        let placeholder = TypeInfo::placeholder(0);
        assert!(placeholder.equals(&TypeInfo::new(type_ids::STRING)));
        assert!(placeholder.equals(&TypeInfo::placeholder(0)));
        assert!(!placeholder.equals(&TypeInfo::placeholder(1)));
    }

    #[test]
    fn array_modifiers_check_per_level() {
        let optional_elems = TypeInfo::new(type_ids::INT).array_of(true, false);
        let plain_elems = TypeInfo::new(type_ids::INT).array_of(false, false);

        // Optional levels accept plain levels, not the reverse.
        assert!(optional_elems.equals(&plain_elems));
        assert!(!plain_elems.equals(&optional_elems));
    }

    #[test]
    fn element_type_drops_one_level() {
        let nested = TypeInfo::new(type_ids::STRING)
            .array_of(false, false)
            .array_of(true, false);
        let element = nested.element_type();
        assert_eq!(element.array_count, 1);
        assert_eq!(element.element_type().array_count, 0);
        assert_eq!(nested.element_type().type_id, type_ids::STRING);
    }

    #[test]
    fn resolve_substitutes_and_merges_depth() {
        let bindings = vec![TypeInfo::new(type_ids::INT).array_of(false, true)];
        let mut info = TypeInfo::placeholder(0).array_of(false, false);

        TypeInfo::resolve_generics(&mut info, &bindings);
        assert!(!info.is_generic);
        assert_eq!(info.type_id, type_ids::INT);
        assert_eq!(info.array_count, 2);
        assert_eq!(info.array_modifiers.as_slice(), &[(false, true), (false, false)]);
    }

    #[test]
    fn resolve_reaches_alternatives() {
        let bindings = vec![TypeInfo::new(type_ids::BOOL)];
        let mut info = TypeInfo::new(type_ids::INT);
        info.alternatives.push(TypeInfo::placeholder(0));

        TypeInfo::resolve_generics(&mut info, &bindings);
        assert_eq!(info.alternatives[0].type_id, type_ids::BOOL);
        assert!(!info.alternatives[0].is_generic);
    }

    #[test]
    fn signature_text_is_compact() {
        let mut info = TypeInfo::new(type_ids::INT).strict();
        info.alternatives.push(TypeInfo::new(type_ids::STRING));
        let info = info.array_of(false, false).array_of(false, false).optional();
        assert_eq!(info.to_string(), "0!|1[2]?");
    }
}
