use crate::header::FormatVersion;

/// Width used for `varchar`/`char` desc types when the file carries none.
pub const DEFAULT_CHAR_SIZE: u16 = 255;

// ── Macro for wire-byte enum boilerplate ──────────────────────────────
//
// Column types are a closed set of named variants, each stored as one
// byte in the header. The macro generates the byte conversion pair and
// the variant table so that the enum's doc comment and derives stay at
// the call site.

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $wire:expr ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Every variant, in wire-byte order.
            pub const ALL: &'static [Self] = &[ $( Self::$variant ),+ ];

            /// Encode this variant as its header byte.
            #[must_use]
            pub fn to_wire_byte(self) -> u8 {
                match self {
                    $( Self::$variant => $wire ),+
                }
            }

            /// Decode a header byte, or `None` if it names no variant.
            #[must_use]
            pub fn from_wire_byte(value: u8) -> Option<Self> {
                match value {
                    $( $wire => Some(Self::$variant), )+
                    _ => None,
                }
            }
        }
    };
}

// ── ColumnType ────────────────────────────────────────────────────────

wire_enum! {
    /// On-disk storage type of a column, one byte per column in the header.
    ///
    /// ```text
    /// ┌──────┬────────────────┬──────────────────────┐
    /// │ Wire │ Type           │ Desc type            │
    /// ├──────┼────────────────┼──────────────────────┤
    /// │ 0x00 │ Varchar        │ varchar(N)           │
    /// │ 0x01 │ Text           │ text                 │
    /// │ 0x02 │ Datetime       │ datetime             │
    /// │ 0x03 │ Char2          │ char(2)              │
    /// │ 0x04 │ Tiny           │ tinyint(3) unsigned  │
    /// │ 0x05 │ Short          │ smallint(5) unsigned │
    /// │ 0x06 │ Long           │ int(11) unsigned     │
    /// │ 0x07 │ LongLong       │ bigint(20) unsigned  │
    /// │ 0x08 │ Decimal        │ decimal(24,12)       │
    /// │ 0x09 │ Char           │ char(N)              │
    /// │ 0x0A │ TinyText       │ tinytext             │
    /// │ 0x0B │ MediumText     │ mediumtext           │
    /// │ 0x0C │ LongText       │ longtext             │
    /// │ 0x0D │ TinySigned     │ tinyint(4)           │
    /// │ 0x0E │ ShortSigned    │ smallint(6)          │
    /// │ 0x0F │ LongSigned     │ int(11)              │
    /// │ 0x10 │ LongLongSigned │ bigint(20)           │
    /// │ 0x11 │ VisitorId      │ bigint(20) unsigned  │
    /// └──────┴────────────────┴──────────────────────┘
    /// ```
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub enum ColumnType {
        Varchar = 0x00,
        Text = 0x01,
        Datetime = 0x02,
        Char2 = 0x03,
        Tiny = 0x04,
        Short = 0x05,
        Long = 0x06,
        LongLong = 0x07,
        Decimal = 0x08,
        Char = 0x09,
        TinyText = 0x0A,
        MediumText = 0x0B,
        LongText = 0x0C,
        TinySigned = 0x0D,
        ShortSigned = 0x0E,
        LongSigned = 0x0F,
        LongLongSigned = 0x10,
        VisitorId = 0x11,
    }
}

/// How a column's per-row value is stored and rendered.
///
/// Derived from the column type and the file's format version; the same
/// type can change class across versions (decimals moved into the
/// dictionary in v4, visitor IDs became plain integers in v8).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageClass {
    /// Value is a dictionary reference (chained index or flat offset).
    Dictionary,
    /// `base + value - 1` as an unsigned integer.
    Unsigned,
    /// `base + value - 1` as a two's-complement signed integer.
    Signed,
    /// Signed value divided by the header's decimal factor.
    Scaled,
    /// Two characters packed into the low bytes of the value.
    Char2,
    /// Index into the visitor-ID dictionary.
    Visitor,
}

impl StorageClass {
    /// Whether the block header carries a `u64` base for this class.
    #[must_use]
    pub fn has_base(self) -> bool {
        matches!(self, Self::Unsigned | Self::Signed | Self::Scaled)
    }
}

impl ColumnType {
    /// Storage class of this type under the given format version.
    #[must_use]
    pub fn storage(self, version: FormatVersion) -> StorageClass {
        match self {
            Self::Varchar
            | Self::Text
            | Self::Datetime
            | Self::Char
            | Self::TinyText
            | Self::MediumText
            | Self::LongText => StorageClass::Dictionary,
            Self::Char2 => StorageClass::Char2,
            Self::Tiny | Self::Short | Self::Long | Self::LongLong => StorageClass::Unsigned,
            Self::TinySigned | Self::ShortSigned | Self::LongSigned | Self::LongLongSigned => {
                StorageClass::Signed
            }
            Self::Decimal if version.has_decimal_factor() => StorageClass::Scaled,
            Self::Decimal => StorageClass::Dictionary,
            Self::VisitorId if version.uses_visitor_dictionary() => StorageClass::Visitor,
            Self::VisitorId => StorageClass::Unsigned,
        }
    }

    /// Whether the header carries a `u16` character width for this type
    /// (versions 4 and later).
    #[must_use]
    pub fn has_char_size(self) -> bool {
        matches!(self, Self::Varchar | Self::Char)
    }

    /// SQL-ish type text written to desc files.
    ///
    /// `char_size` only matters for `Varchar` and `Char`; when `None` the
    /// [`DEFAULT_CHAR_SIZE`] is used.
    #[must_use]
    pub fn desc_type(self, char_size: Option<u16>) -> String {
        let width = char_size.unwrap_or(DEFAULT_CHAR_SIZE);
        let fixed = match self {
            Self::Varchar => return format!("varchar({width})"),
            Self::Char => return format!("char({width})"),
            Self::Text => "text",
            Self::Datetime => "datetime",
            Self::Char2 => "char(2)",
            Self::Tiny => "tinyint(3) unsigned",
            Self::Short => "smallint(5) unsigned",
            Self::Long => "int(11) unsigned",
            Self::LongLong | Self::VisitorId => "bigint(20) unsigned",
            Self::Decimal => "decimal(24,12)",
            Self::TinyText => "tinytext",
            Self::MediumText => "mediumtext",
            Self::LongText => "longtext",
            Self::TinySigned => "tinyint(4)",
            Self::ShortSigned => "smallint(6)",
            Self::LongSigned => "int(11)",
            Self::LongLongSigned => "bigint(20)",
        };
        fixed.to_string()
    }
}
