/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{error::Error, fmt};

pub trait TypeDBError {
    fn variant_name(&self) -> &'static str;

    fn component(&self) -> &'static str;

    fn code(&self) -> &'static str;

    fn code_prefix(&self) -> &'static str;

    fn code_number(&self) -> usize;

    fn format_description(&self) -> String;

    fn source(&self) -> Option<&(dyn Error + Sync)>;

    fn source_typedb_error(&self) -> Option<&(dyn TypeDBError + Sync)>;

    fn root_source_typedb_error(&self) -> &(dyn TypeDBError + Sync)
    where
        Self: Sized + Sync,
    {
        let mut error: &(dyn TypeDBError + Sync) = self;
        while let Some(source) = error.source_typedb_error() {
            error = source;
        }
        error
    }

    fn format_code_and_description(&self) -> String {
        format!("[{}] {}", self.code(), self.format_description())
    }
}

impl PartialEq for dyn TypeDBError {
    fn eq(&self, other: &Self) -> bool {
        self.code() == other.code()
    }
}

impl Eq for dyn TypeDBError {}

impl fmt::Debug for dyn TypeDBError + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Renders the error followed by one indented `Cause` line per wrapped error, innermost last.
impl fmt::Display for dyn TypeDBError + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_code_and_description())?;
        let mut current: &dyn TypeDBError = self;
        let mut depth = 1;
        loop {
            if let Some(cause) = current.source_typedb_error() {
                write!(f, "\n{:indent$}Cause: {}", "", cause.format_code_and_description(), indent = depth * 2)?;
                current = cause;
                depth += 1;
            } else {
                if let Some(cause) = current.source() {
                    write!(f, "\n{:indent$}Cause: {}", "", cause, indent = depth * 2)?;
                }
                return Ok(());
            }
        }
    }
}

/// Declares an error enum with a stable code per variant, `prefix` followed by the variant number.
/// A variant wraps at most one cause: either a plain `source` or a `typedb_source`, which is reported first.
#[macro_export]
macro_rules! typedb_error {
    ( $vis: vis $name:ident(component = $component: literal, prefix = $prefix: literal) { $(
        $variant: ident (
            $number: literal,
            $description: literal
            $(, $payload_name: ident : $payload_type: ty )*
            $(, ( source : $source: ty ) )?
            $(, ( typedb_source : $typedb_source: ty ) )?
        ),
    )*}) => {
        #[derive(Clone)]
        $vis enum $name {
            $(
                $variant { $(source: $source, )? $(typedb_source: $typedb_source, )? $($payload_name: $payload_type, )* },
            )*
        }

        impl $name {
            // Duplicate variant numbers are unreachable arms.
            const _UNIQUE_NUMBERS: () = {
                #[deny(unreachable_patterns)]
                match 0usize {
                    $( $number => (), )*
                    _ => (),
                }
            };
        }

        impl $crate::TypeDBError for $name {
            fn variant_name(&self) -> &'static str {
                match self {
                    $(
                        Self::$variant { .. } => &stringify!($variant),
                    )*
                }
            }

            fn component(&self) -> &'static str {
                &$component
            }

            fn code(&self) -> &'static str {
                match self {
                    $(
                        Self::$variant { .. } => & concat!($prefix, stringify!($number)),
                    )*
                }
            }

            fn code_prefix(&self) -> &'static str {
                $prefix
            }

            fn code_number(&self) -> usize {
                match self {
                    $(
                        Self::$variant { .. } => $number,
                    )*
                }
            }

            fn format_description(&self) -> String {
                match self {
                    $(
                        Self::$variant { $( $payload_name, )* .. } => format!($description),
                    )*
                }
            }

            fn source(&self) -> Option<&(dyn ::std::error::Error + Sync + 'static)> {
                let error = match self {
                    $(
                        $(Self::$variant { source, .. } => {
                            let source: &$source = source;
                            Some(source as &(dyn ::std::error::Error + Sync))
                        })?
                    )*
                    #[allow(unreachable_patterns)]
                    _ => None
                };
                error
            }

            fn source_typedb_error(&self) -> Option<&(dyn $crate::TypeDBError + Sync + 'static)> {
                let error = match self {
                    $(
                        $(Self::$variant { typedb_source, .. } => {
                            let typedb_source: &$typedb_source = typedb_source;
                            Some(typedb_source as &(dyn $crate::TypeDBError + Sync))
                        })?
                    )*
                    #[allow(unreachable_patterns)]
                    _ => None
                };
                error
            }
        }

        impl ::std::fmt::Debug for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                ::std::fmt::Display::fmt(self, f)
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                ::std::fmt::Display::fmt(self as &dyn $crate::TypeDBError, f)
            }
        }

        impl ::std::error::Error for $name {
            fn source(&self) -> Option<&(dyn ::std::error::Error + 'static)> {
                match self {
                    $(
                        $(Self::$variant { source, .. } => {
                            let source: &$source = source;
                            Some(source as &(dyn ::std::error::Error + 'static))
                        })?
                    )*
                    #[allow(unreachable_patterns)]
                    _ => None,
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::TypeDBError;

    typedb_error!(
        pub(crate) InnerError(component = "Inner", prefix = "INN") {
            Missing(1, "Missing '{name}'.", name: String),
            Unreadable(2, "Unreadable input.", ( source : std::sync::Arc<std::io::Error> )),
        }
    );

    typedb_error!(
        pub(crate) OuterError(component = "Outer", prefix = "OUT") {
            Wrapped(7, "Wrapped failure at depth {depth}.", depth: usize, ( typedb_source : InnerError )),
            Plain(8, "Plain failure."),
        }
    );

    #[test]
    fn codes_are_prefix_and_number() {
        let error = OuterError::Plain {};
        assert_eq!(error.code(), "OUT8");
        assert_eq!(error.code_prefix(), "OUT");
        assert_eq!(error.code_number(), 8);
        assert_eq!(error.component(), "Outer");
        assert_eq!(error.format_code_and_description(), "[OUT8] Plain failure.");
    }

    #[test]
    fn root_source_follows_the_chain() {
        let inner = InnerError::Missing { name: "person".to_owned() };
        let error = OuterError::Wrapped { depth: 2, typedb_source: inner };
        assert_eq!(error.format_description(), "Wrapped failure at depth 2.");
        assert_eq!(error.source_typedb_error().map(|source| source.code()), Some("INN1"));
        assert_eq!(error.root_source_typedb_error().format_description(), "Missing 'person'.");
        assert_eq!(error.to_string(), "[OUT7] Wrapped failure at depth 2.\n  Cause: [INN1] Missing 'person'.");
        assert_eq!(format!("{error:?}"), error.to_string());
    }

    #[test]
    fn plain_sources_close_the_cause_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "statistics file");
        let inner = InnerError::Unreadable { source: std::sync::Arc::new(io) };
        let error = OuterError::Wrapped { depth: 1, typedb_source: inner };
        assert_eq!(
            error.to_string(),
            "[OUT7] Wrapped failure at depth 1.\n  Cause: [INN2] Unreadable input.\n    Cause: statistics file"
        );
        assert!(std::error::Error::source(&error).is_none());
        assert_eq!(error.root_source_typedb_error().code(), "INN2");
        let OuterError::Wrapped { typedb_source, .. } = &error else { unreachable!() };
        let cause = std::error::Error::source(typedb_source).map(|source| source.to_string());
        assert_eq!(cause.as_deref(), Some("statistics file"));
    }
}
