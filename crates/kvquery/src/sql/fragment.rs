use crate::{
    error::QueryError,
    sql::{Bind, CompileLimits, Statement},
};
use std::borrow::Cow;

const PLACEHOLDER: &str = "?";

///
/// Fragment
///
/// One piece of a statement. A `Bind` renders as a placeholder and carries
/// its value, so text and binds can only be produced together.
///

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Fragment {
    Text(Cow<'static, str>),
    Bind(Bind),
}

///
/// SqlBuffer
///
/// Ordered fragment list with running limit checks.
///

#[derive(Debug)]
pub(crate) struct SqlBuffer {
    fragments: Vec<Fragment>,
    text_len: usize,
    limits: CompileLimits,
}

impl SqlBuffer {
    pub(crate) const fn new(limits: CompileLimits) -> Self {
        Self {
            fragments: Vec::new(),
            text_len: 0,
            limits,
        }
    }

    pub(crate) const fn limits(&self) -> &CompileLimits {
        &self.limits
    }

    pub(crate) fn push(&mut self, text: impl Into<Cow<'static, str>>) -> Result<(), QueryError> {
        let text = text.into();
        if text.is_empty() {
            return Ok(());
        }
        self.grow(text.len())?;
        self.fragments.push(Fragment::Text(text));

        Ok(())
    }

    pub(crate) fn bind(&mut self, bind: impl Into<Bind>) -> Result<(), QueryError> {
        let bind = bind.into();
        let len = bind.byte_len();
        if len > self.limits.max_bind_bytes {
            return Err(QueryError::ValueTooLarge {
                len,
                max: self.limits.max_bind_bytes,
            });
        }
        self.grow(PLACEHOLDER.len())?;
        self.fragments.push(Fragment::Bind(bind));

        Ok(())
    }

    /// Move every fragment of `inner` to the end of this buffer.
    pub(crate) fn append(&mut self, inner: Self) -> Result<(), QueryError> {
        self.grow(inner.text_len)?;
        self.fragments.extend(inner.fragments);

        Ok(())
    }

    /// Flatten into statement text plus binds in placeholder order.
    pub(crate) fn finish(self) -> Statement {
        let mut sql = String::with_capacity(self.text_len);
        let mut binds = Vec::new();
        for fragment in self.fragments {
            match fragment {
                Fragment::Text(text) => sql.push_str(&text),
                Fragment::Bind(bind) => {
                    sql.push_str(PLACEHOLDER);
                    binds.push(bind);
                }
            }
        }

        Statement { sql, binds }
    }

    fn grow(&mut self, len: usize) -> Result<(), QueryError> {
        self.text_len += len;
        if self.text_len > self.limits.max_sql_len {
            return Err(QueryError::TextTooLarge {
                max: self.limits.max_sql_len,
            });
        }

        Ok(())
    }
}
