//! HTTP request methods.

use pastey::paste;

macro_rules! define_method {
    (
        $( #[$attr_meta:meta] )*
        $v:vis enum $name:ident {
            $( $variant:ident ),* $(,)?
        }
    ) => {
        $( #[$attr_meta] )*
        $v enum $name {
            $( $variant, )*
        }

        impl $name {
            pub const ITEMS: &'static [Self] = &[ $( Self::$variant, )* ];
        }

        paste! {
            impl ::core::fmt::Display for $name {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    let value = match self {
                        $( Self::$variant => stringify!([<$variant:upper>]), )*
                    };
                    write!(f, "{}", value)
                }
            }
        }
    };
}

define_method!(
    /// The HTTP method requested. `Unknown` is a sentinel, not a
    /// wire-sendable value — the engine rejects it before connecting.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub enum HttpMethod {
        #[default]
        Unknown,
        Get,
        Post,
        Put,
        Patch,
        Delete,
        Options,
    }
);

impl HttpMethod {
    pub fn is_known(self) -> bool {
        !matches!(self, HttpMethod::Unknown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_are_uppercase() {
        assert_eq!(HttpMethod::Get.to_string(), "GET");
        assert_eq!(HttpMethod::Options.to_string(), "OPTIONS");
        assert_eq!(HttpMethod::Unknown.to_string(), "UNKNOWN");
    }

    #[test]
    fn unknown_is_not_known() {
        assert!(!HttpMethod::Unknown.is_known());
        assert!(HttpMethod::Get.is_known());
    }
}
