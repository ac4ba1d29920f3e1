//! Newtype IDs for type-safe entity references.
//!
//! Use the `define_ref!` macro to create type-safe wrappers around the opaque
//! string identifiers handed out by the backend, preventing accidental mixing
//! of references from different entity types.

use uuid::Uuid;

/// Macro to define a type-safe string-backed identifier.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - Conversion methods: `new()`, `as_str()`
/// - `From<String>` and `From<&str>` implementations
///
/// # Example
///
/// ```rust
/// # use sundrift_core::define_ref;
/// define_ref!(SkuRef);
/// define_ref!(WarehouseRef);
///
/// let sku = SkuRef::new("sku-123");
/// let warehouse = WarehouseRef::new("wh-7");
///
/// // These are different types, so this won't compile:
/// // let _: SkuRef = warehouse;
/// ```
#[macro_export]
macro_rules! define_ref {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new reference from any string-like value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the underlying string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

// Entity references handed out by the backend
define_ref!(ProductRef);
define_ref!(LineId);
define_ref!(UserId);
define_ref!(OrderId);
define_ref!(CouponCode);

impl ProductRef {
    /// Whether this reference is usable.
    ///
    /// Persisted guest carts and partially-hydrated backend responses can
    /// carry empty references; those line items are dropped at every
    /// read/write boundary.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl LineId {
    /// Generate a fresh local line ID.
    ///
    /// Used for guest carts; authenticated carts carry server-assigned IDs.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl CouponCode {
    /// Normalized form used for lookups: trimmed, uppercase.
    #[must_use]
    pub fn normalized(&self) -> Self {
        Self(self.0.trim().to_uppercase())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_product_ref_blank() {
        assert!(ProductRef::new("").is_blank());
        assert!(ProductRef::new("   ").is_blank());
        assert!(!ProductRef::new("prod-1").is_blank());
    }

    #[test]
    fn test_line_id_generate_unique() {
        assert_ne!(LineId::generate(), LineId::generate());
    }

    #[test]
    fn test_coupon_code_normalized() {
        assert_eq!(
            CouponCode::new(" save10 ").normalized(),
            CouponCode::new("SAVE10")
        );
    }

    #[test]
    fn test_serde_transparent() {
        let id = ProductRef::new("prod-9");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"prod-9\"");

        let parsed: ProductRef = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_display() {
        assert_eq!(OrderId::new("ord-42").to_string(), "ord-42");
    }
}
