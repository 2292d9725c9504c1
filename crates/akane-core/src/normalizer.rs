//! Raw transport event → [`InboundMessage`] conversion.

use crate::message::InboundMessage;

/// Converts raw transport events into normalized messages.
///
/// Returning `None` means "ignore this event": self-sent messages,
/// protocol-internal traffic or anything malformed. The dispatch pipeline is
/// never entered for such events.
///
/// # Example
///
/// ```rust,ignore
/// struct LineNormalizer { prefixes: PrefixSet }
///
/// impl Normalizer for LineNormalizer {
///     type Raw = String;
///
///     fn normalize(&self, raw: String) -> Option<InboundMessage> {
///         let body = raw.trim();
///         (!body.is_empty()).then(|| {
///             InboundMessage::builder("0", "console", "console")
///                 .body(body)
///                 .prefixes(&self.prefixes)
///                 .build()
///         })
///     }
/// }
/// ```
pub trait Normalizer: Send + Sync + 'static {
    /// The transport's raw event type.
    type Raw: Send + 'static;

    /// Normalizes one raw event, or returns `None` to drop it.
    fn normalize(&self, raw: Self::Raw) -> Option<InboundMessage>;
}
