//! Reading and writing of annotated corpora.

mod derive;
pub use self::derive::{derive_disambiguation, split_lemma, DisambiguationTable, NO_DISAMBIGUATION};

mod error;
pub use self::error::ParseError;

mod reader;
pub use self::reader::{
    is_disambiguation_site, Columns, Context, DisambiguationReader, Example, SiteRecord, Sites,
};

mod tsv;
pub use self::tsv::{CorpusSentences, RawSentence, ReadSentences, TsvCorpus, TsvReader, TsvWriter};
