// Declarative macros generating parse/serialize boilerplate for the simple,
// fixed-shape TLS wire types (single-byte enums and fixed-field structs).

/// Defines a single-byte enum with named cases plus an `unknown(u8)` fallback
/// for any byte value the implementation doesn't specifically recognize.
#[macro_export]
macro_rules! tls_enum_u8 {
    ($name:ident => { $( $case:ident ( $val:expr ) ),* , (255) }) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq)]
        pub enum $name {
            $(
                $case,
            )*
            unknown(u8)
        }

        impl $name {
            pub fn to_u8(&self) -> u8 {
                match self {
                    $(
                        $name::$case => $val,
                    )*
                    $name::unknown(v) => *v
                }
            }

            pub fn from_u8(v: u8) -> Self {
                match v {
                    $(
                        $val => $name::$case,
                    )*
                    _ => $name::unknown(v)
                }
            }

            pub fn parse(input: &mut bytes::Bytes) -> crate::tls::error::Result<Self> {
                use bytes::Buf;
                if input.remaining() < 1 {
                    return Err(crate::tls::error::HandshakeError::UnexpectedMessage(
                        concat!("truncated ", stringify!($name)).into(),
                    ));
                }
                Ok(Self::from_u8(input.get_u8()))
            }

            pub fn serialize(&self, out: &mut Vec<u8>) {
                out.push(self.to_u8());
            }
        }
    };
}

/// Defines a struct whose fields each implement `parse`/`serialize`, chaining
/// them in declaration order.
#[macro_export]
macro_rules! tls_struct {
    ($name:ident => { $( $typ:ident $field:ident );* ; }) => {
        #[derive(Debug)]
        pub struct $name {
            $(
                pub $field: $typ,
            )*
        }

        impl $name {
            pub fn parse(input: &mut bytes::Bytes) -> crate::tls::error::Result<Self> {
                $(
                    let $field = $typ::parse(input)?;
                )*
                Ok(Self { $( $field, )* })
            }

            pub fn serialize(&self, out: &mut Vec<u8>) {
                $(
                    self.$field.serialize(out);
                )*
            }
        }
    };
}

/// Defines a 16-bit registry enum with named cases plus an `Unknown(u16)`
/// fallback, used for extensible wire registries (cipher suites, signature
/// schemes, named groups).
#[macro_export]
macro_rules! enum_def_with_unknown {
    ($(#[$meta:meta])* $name:ident u16 => $( $case:ident = $val:expr ),* $(,)?) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum $name {
            $(
                $case,
            )*
            Unknown(u16)
        }

        impl $name {
            pub fn to_u16(&self) -> u16 {
                match self {
                    $(
                        $name::$case => $val,
                    )*
                    $name::Unknown(v) => *v,
                }
            }

            pub fn from_u16(v: u16) -> Self {
                match v {
                    $(
                        $val => $name::$case,
                    )*
                    _ => $name::Unknown(v),
                }
            }
        }
    };
}
