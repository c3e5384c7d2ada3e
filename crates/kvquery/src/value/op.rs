use derive_more::Display;

///
/// Category
///
/// Rendering class of an operator. Every rendering decision in the compiler
/// is taken on the category; the variant only selects the exact fragment.
///

#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum Category {
    Compare,
    Relational,
    Range,
    PrefixKeyMarker,
    GroupMarker,
    LinkMarker,
    Keyword,
    SuggestIndexMarker,
    InKeysMarker,
    Invalid,
}

impl Category {
    /// Categories that render a field expression followed by values.
    #[must_use]
    pub const fn is_value(self) -> bool {
        matches!(self, Self::Compare | Self::Relational | Self::Range)
    }

    /// Categories that never reach the predicate body text.
    #[must_use]
    pub const fn is_side_channel(self) -> bool {
        matches!(
            self,
            Self::PrefixKeyMarker | Self::SuggestIndexMarker | Self::InKeysMarker
        )
    }
}

///
/// Operator
///

#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum Operator {
    EqualTo,
    NotEqualTo,
    GreaterThan,
    LessThan,
    GreaterOrEqual,
    LessOrEqual,
    Like,
    NotLike,
    IsNull,
    IsNotNull,
    In,
    NotIn,
    PrefixKey,
    BeginGroup,
    EndGroup,
    And,
    Or,
    Limit,
    OrderBy,
    SuggestIndex,
    InKeys,
    Invalid,
}

impl Operator {
    #[must_use]
    pub const fn category(self) -> Category {
        match self {
            Self::EqualTo
            | Self::NotEqualTo
            | Self::GreaterThan
            | Self::LessThan
            | Self::GreaterOrEqual
            | Self::LessOrEqual => Category::Compare,
            Self::Like | Self::NotLike | Self::IsNull | Self::IsNotNull => Category::Relational,
            Self::In | Self::NotIn => Category::Range,
            Self::PrefixKey => Category::PrefixKeyMarker,
            Self::BeginGroup | Self::EndGroup => Category::GroupMarker,
            Self::And | Self::Or => Category::LinkMarker,
            Self::Limit | Self::OrderBy => Category::Keyword,
            Self::SuggestIndex => Category::SuggestIndexMarker,
            Self::InKeys => Category::InKeysMarker,
            Self::Invalid => Category::Invalid,
        }
    }

    /// True when the rendered node consumes bound values.
    /// `IsNull`/`IsNotNull` render a field expression but bind nothing.
    #[must_use]
    pub const fn is_value_bearing(self) -> bool {
        match self.category() {
            Category::Compare | Category::Range => true,
            Category::Relational => matches!(self, Self::Like | Self::NotLike),
            _ => false,
        }
    }

    /// SQL text emitted between the field expression and the values.
    ///
    /// Range fragments open the value list; the caller closes it.
    #[must_use]
    pub const fn sql_fragment(self) -> &'static str {
        match self {
            Self::EqualTo => "= ",
            Self::NotEqualTo => "!= ",
            Self::GreaterThan => "> ",
            Self::LessThan => "< ",
            Self::GreaterOrEqual => ">= ",
            Self::LessOrEqual => "<= ",
            Self::Like => " LIKE ",
            Self::NotLike => " NOT LIKE ",
            Self::IsNull => " IS NULL ",
            Self::IsNotNull => " IS NOT NULL ",
            Self::In => " IN (",
            Self::NotIn => " NOT IN (",
            Self::And => " AND ",
            Self::Or => " OR ",
            Self::BeginGroup => "(",
            Self::EndGroup => ")",
            Self::PrefixKey
            | Self::Limit
            | Self::OrderBy
            | Self::SuggestIndex
            | Self::InKeys
            | Self::Invalid => "",
        }
    }

    /// Stable one-byte tag used by query fingerprints.
    #[must_use]
    pub const fn tag(self) -> u8 {
        match self {
            Self::EqualTo => 0x01,
            Self::NotEqualTo => 0x02,
            Self::GreaterThan => 0x03,
            Self::LessThan => 0x04,
            Self::GreaterOrEqual => 0x05,
            Self::LessOrEqual => 0x06,
            Self::Like => 0x10,
            Self::NotLike => 0x11,
            Self::IsNull => 0x12,
            Self::IsNotNull => 0x13,
            Self::In => 0x20,
            Self::NotIn => 0x21,
            Self::PrefixKey => 0x30,
            Self::BeginGroup => 0x40,
            Self::EndGroup => 0x41,
            Self::And => 0x50,
            Self::Or => 0x51,
            Self::Limit => 0x60,
            Self::OrderBy => 0x61,
            Self::SuggestIndex => 0x70,
            Self::InKeys => 0x80,
            Self::Invalid => 0xFF,
        }
    }
}

/// Classify an operator. Free-function form of [`Operator::category`].
#[must_use]
pub const fn classify(op: Operator) -> Category {
    op.category()
}
