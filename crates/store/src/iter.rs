use core::fmt::{self, Debug, Formatter};
use core::marker::PhantomData;

use crate::entry::Codec;
use crate::key::FromKeyParts;

type RawEntry = eyre::Result<(Vec<u8>, Vec<u8>)>;

/// Ordered iteration over the raw entries of one column.
///
/// Iteration fuses after the first error so that callers never observe
/// entries past a failed read.
pub struct Iter<'a> {
    done: bool,
    inner: Box<dyn Iterator<Item = RawEntry> + Send + 'a>,
}

impl Debug for Iter<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Iter").field("done", &self.done).finish()
    }
}

impl<'a> Iter<'a> {
    pub fn new<T>(inner: T) -> Self
    where
        T: Iterator<Item = RawEntry> + Send + 'a,
    {
        Self {
            done: false,
            inner: Box::new(inner),
        }
    }

    /// Decodes keys and values while iterating.
    #[must_use]
    pub fn structured<K: FromKeyParts, C: Codec>(self) -> Structured<'a, K, C> {
        Structured {
            inner: self,
            _priv: PhantomData,
        }
    }
}

impl Iterator for Iter<'_> {
    type Item = RawEntry;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let item = self.inner.next();

        if !matches!(item, Some(Ok(_))) {
            self.done = true;
        }

        item
    }
}

pub struct Structured<'a, K, C> {
    inner: Iter<'a>,
    _priv: PhantomData<(K, C)>,
}

impl<K, C> Debug for Structured<'_, K, C> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Structured").field(&self.inner).finish()
    }
}

impl<K: FromKeyParts, C: Codec> Iterator for Structured<'_, K, C> {
    type Item = eyre::Result<(K, C::DataType)>;

    fn next(&mut self) -> Option<Self::Item> {
        let (key, value) = match self.inner.next()? {
            Ok(entry) => entry,
            Err(err) => return Some(Err(err)),
        };

        let decoded = K::try_from_parts(&key).and_then(|key| Ok((key, C::decode(&value)?)));

        if decoded.is_err() {
            self.inner.done = true;
        }

        Some(decoded)
    }
}
