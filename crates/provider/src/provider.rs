use async_trait::async_trait;

use cadence_core::Channel;

use crate::error::ProviderError;
use crate::types::{SendReceipt, SendRequest};

/// Strongly-typed provider trait with native `async fn`.
///
/// This trait is **not** object-safe because it uses native `async fn`
/// methods (which desugar to opaque `impl Future` return types). If you need
/// dynamic dispatch, use [`DynProvider`] instead -- every `Provider`
/// automatically implements `DynProvider` via a blanket implementation.
pub trait Provider: Send + Sync {
    /// Returns the unique name of this provider.
    fn name(&self) -> &str;

    /// The channel this provider delivers on.
    fn channel(&self) -> Channel;

    /// Execute the given send and return a receipt.
    fn send(
        &self,
        request: &SendRequest,
    ) -> impl std::future::Future<Output = Result<SendReceipt, ProviderError>> + Send;

    /// Verify the signature of an inbound webhook callback.
    ///
    /// Must operate on the exact unparsed payload bytes; re-serializing the
    /// payload before verification would break on canonicalization
    /// differences.
    fn verify_signature(&self, raw_payload: &[u8], signature_header: &str) -> bool;
}

/// Object-safe provider trait for use behind `Arc<dyn DynProvider>`.
///
/// Uses [`macro@async_trait`] to enable dynamic dispatch of async methods.
/// You generally should not implement this trait directly -- instead
/// implement [`Provider`] and rely on the blanket implementation.
#[async_trait]
pub trait DynProvider: Send + Sync {
    /// Returns the unique name of this provider.
    fn name(&self) -> &str;

    /// The channel this provider delivers on.
    fn channel(&self) -> Channel;

    /// Execute the given send and return a receipt.
    async fn send(&self, request: &SendRequest) -> Result<SendReceipt, ProviderError>;

    /// Verify the signature of an inbound webhook callback.
    fn verify_signature(&self, raw_payload: &[u8], signature_header: &str) -> bool;
}

/// Blanket implementation: any type that implements [`Provider`] also
/// implements [`DynProvider`], bridging the static and dynamic dispatch
/// worlds.
#[async_trait]
impl<T: Provider + Sync> DynProvider for T {
    fn name(&self) -> &str {
        Provider::name(self)
    }

    fn channel(&self) -> Channel {
        Provider::channel(self)
    }

    async fn send(&self, request: &SendRequest) -> Result<SendReceipt, ProviderError> {
        Provider::send(self, request).await
    }

    fn verify_signature(&self, raw_payload: &[u8], signature_header: &str) -> bool {
        Provider::verify_signature(self, raw_payload, signature_header)
    }
}
