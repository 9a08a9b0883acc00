use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::key::AsKeyParts;

/// Converts between a stored byte representation and a typed value.
pub trait Codec {
    type DataType;

    fn encode(value: &Self::DataType) -> eyre::Result<Vec<u8>>;
    fn decode(bytes: &[u8]) -> eyre::Result<Self::DataType>;
}

/// Stores the value's serde JSON form.
#[derive(Debug)]
pub struct Json<T>(core::marker::PhantomData<T>);

impl<T: Serialize + DeserializeOwned> Codec for Json<T> {
    type DataType = T;

    fn encode(value: &T) -> eyre::Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(Into::into)
    }

    fn decode(bytes: &[u8]) -> eyre::Result<T> {
        serde_json::from_slice(bytes).map_err(Into::into)
    }
}

/// Stores raw bytes untouched.
#[derive(Debug)]
pub struct Identity<T>(core::marker::PhantomData<T>);

impl<T: AsRef<[u8]> + From<Vec<u8>>> Codec for Identity<T> {
    type DataType = T;

    fn encode(value: &T) -> eyre::Result<Vec<u8>> {
        Ok(value.as_ref().to_vec())
    }

    fn decode(bytes: &[u8]) -> eyre::Result<T> {
        Ok(T::from(bytes.to_vec()))
    }
}

/// Binds a key type to the codec of the value stored under it.
pub trait Entry: AsKeyParts {
    type Codec: Codec;
}

pub type DataType<E> = <<E as Entry>::Codec as Codec>::DataType;
