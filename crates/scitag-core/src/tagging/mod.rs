pub mod bilou;
pub mod convert;
pub mod viterbi;

pub use bilou::{BilouPrefix, BilouTag};
pub use convert::{offsets_from_bilou, BilouConverter, Conversion, Span, TaggedToken};
pub use viterbi::{TagSet, ViterbiDecoder};
