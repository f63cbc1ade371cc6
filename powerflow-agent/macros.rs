//! Declarative macros to reduce boilerplate across the powerflow codebase

/// Define a fieldless enum with `name()` and `all()` implementations
///
/// # Example
/// ```
/// use powerflow::named_enum;
///
/// named_enum! {
///     pub enum Domain {
///         Package => "package",
///         Dram => "dram",
///     }
/// }
///
/// assert_eq!(Domain::Dram.name(), "dram");
/// assert_eq!(Domain::all().len(), 2);
/// ```
///
/// Expands to:
/// - An enum with Debug, Clone, Copy, PartialEq, Eq, Hash derives
/// - A `name(&self) -> &'static str` method
/// - An `all() -> Vec<Self>` method
#[macro_export]
macro_rules! named_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($variant:ident => $str:literal),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($variant,)*
        }

        impl $name {
            pub fn name(&self) -> &'static str {
                match self {
                    $($name::$variant => $str,)*
                }
            }

            pub fn all() -> Vec<$name> {
                vec![$($name::$variant,)*]
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

/// Insert `socket_<n>` objects into a structured value, one per reading
///
/// # Example
/// ```ignore
/// // In engine::Powerflow::energy_json()
/// socket_objects!(out, readings, |r| energy_object(r));
/// ```
#[macro_export]
macro_rules! socket_objects {
    ($target:expr, $readings:expr, |$r:ident| $body:expr) => {
        for $r in $readings.iter() {
            $target.insert($crate::output::socket_key($r.socket), $body);
        }
    };
}
