//! A `tonic` codec that frames JSON instead of Protocol Buffers.
//!
//! The teacher's own `aerolithdb-api/src/grpc.rs` falls back to "manual
//! type definitions" when `protoc` is unavailable at build time
//! (`aerolithdb-api/build.rs`); this crate commits to that manual path
//! permanently rather than conditionally, since the plugin wire schema
//! (spec.md §4.3, §6.4) is defined in terms of JSON-representable request
//! and response shapes, not a `.proto` file. `tonic::client::Grpc::unary`
//! accepts any `Codec`, so a generic JSON codec gets us real HTTP/2 gRPC
//! framing without generated stubs.

use bytes::{Buf, BufMut};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use tonic::codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder};
use tonic::Status;

#[derive(Debug)]
pub struct JsonCodec<T, U>(PhantomData<(T, U)>);

impl<T, U> Default for JsonCodec<T, U> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

impl<T, U> Codec for JsonCodec<T, U>
where
    T: Serialize + Send + Sync + 'static,
    U: DeserializeOwned + Send + Sync + 'static,
{
    type Encode = T;
    type Decode = U;
    type Encoder = JsonEncoder<T>;
    type Decoder = JsonDecoder<U>;

    fn encoder(&mut self) -> Self::Encoder {
        JsonEncoder(PhantomData)
    }

    fn decoder(&mut self) -> Self::Decoder {
        JsonDecoder(PhantomData)
    }
}

#[derive(Debug)]
pub struct JsonEncoder<T>(PhantomData<T>);

impl<T: Serialize> Encoder for JsonEncoder<T> {
    type Item = T;
    type Error = Status;

    fn encode(&mut self, item: Self::Item, buf: &mut EncodeBuf<'_>) -> Result<(), Status> {
        let bytes = serde_json::to_vec(&item)
            .map_err(|e| Status::internal(format!("json encode failed: {e}")))?;
        buf.put_slice(&bytes);
        Ok(())
    }
}

#[derive(Debug)]
pub struct JsonDecoder<U>(PhantomData<U>);

impl<U: DeserializeOwned> Decoder for JsonDecoder<U> {
    type Item = U;
    type Error = Status;

    fn decode(&mut self, buf: &mut DecodeBuf<'_>) -> Result<Option<Self::Item>, Status> {
        if !buf.has_remaining() {
            return Ok(None);
        }
        let bytes = buf.copy_to_bytes(buf.remaining());
        let item = serde_json::from_slice(&bytes)
            .map_err(|e| Status::internal(format!("json decode failed: {e}")))?;
        Ok(Some(item))
    }
}
