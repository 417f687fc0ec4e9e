use std::io::Read;
use std::path::{Path, PathBuf};

use failure::{format_err, Error, Fail};
use serde_derive::{Deserialize, Serialize};

use crate::io::{Columns, DisambiguationReader, TsvCorpus};

/// Configuration error.
#[derive(Clone, Debug, Fail, PartialEq)]
pub enum ConfigError {
    /// Training data did not result in any batch.
    #[fail(display = "training data does not contain disambiguation sites, loss is empty")]
    EmptyLoss,

    #[fail(display = "batch size must be at least 1")]
    InvalidBatchSize,

    /// The development and test fractions do not leave training data.
    #[fail(display = "invalid data split: dev {}, test {}", dev, test)]
    InvalidSplit { dev: f32, test: f32 },

    #[fail(display = "maximum sentence length must be at least 1")]
    InvalidMaxSentLen,

    #[fail(display = "unsupported device: {}", device)]
    UnsupportedDevice { device: String },
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub reader: ReaderConfig,

    #[serde(default)]
    pub train: TrainConfig,

    #[serde(default)]
    pub dataset: DatasetConfig,

    #[serde(default)]
    pub model: ModelConfig,
}

impl Config {
    /// Make configuration paths relative to the configuration file.
    pub fn relativize_paths<P>(&mut self, config_path: P) -> Result<(), Error>
    where
        P: AsRef<Path>,
    {
        let config_path = config_path.as_ref();

        self.model.archive = relativize_path(config_path, &self.model.archive)?;

        Ok(())
    }

    /// Check option values that cannot be expressed in types.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.train.batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize);
        }

        if self.reader.max_sent_len == Some(0) {
            return Err(ConfigError::InvalidMaxSentLen);
        }

        let dev = self.dataset.dev;
        let test = self.dataset.test;
        if dev < 0. || test < 0. || dev + test >= 1. {
            return Err(ConfigError::InvalidSplit { dev, test });
        }

        Ok(())
    }
}

pub trait TomlRead {
    fn from_toml_read<R>(read: R) -> Result<Config, Error>
    where
        R: Read;
}

impl TomlRead for Config {
    fn from_toml_read<R>(mut read: R) -> Result<Self, Error>
    where
        R: Read,
    {
        let mut data = String::new();
        read.read_to_string(&mut data)?;
        let config: Config = toml::from_str(&data)?;
        config.validate()?;

        Ok(config)
    }
}

/// Corpus reader configuration.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ReaderConfig {
    /// Column separator.
    #[serde(default = "default_separator")]
    pub separator: char,

    /// Split sentences that are longer than this number of tokens.
    pub max_sent_len: Option<usize>,

    #[serde(default = "default_lemma_column")]
    pub lemma: String,

    #[serde(default = "default_pos_column")]
    pub pos: String,

    #[serde(default = "default_disambiguation_column")]
    pub disambiguation: String,
}

impl ReaderConfig {
    pub fn columns(&self) -> Columns {
        Columns {
            lemma: self.lemma.clone(),
            pos: self.pos.clone(),
            disambiguation: self.disambiguation.clone(),
        }
    }

    /// Open a corpus consisting of the given files.
    pub fn corpus<I, P>(&self, paths: I) -> TsvCorpus
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        TsvCorpus::new(paths)
            .separator(self.separator)
            .max_sent_len(self.max_sent_len)
    }

    /// Open a reader for the disambiguation sites of the given files.
    pub fn reader<I, P>(&self, paths: I) -> DisambiguationReader<TsvCorpus>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        DisambiguationReader::new(self.corpus(paths), self.columns())
    }
}

impl Default for ReaderConfig {
    fn default() -> Self {
        let columns = Columns::default();
        ReaderConfig {
            separator: default_separator(),
            max_sent_len: None,
            lemma: columns.lemma,
            pos: columns.pos,
            disambiguation: columns.disambiguation,
        }
    }
}

fn default_separator() -> char {
    '\t'
}

fn default_lemma_column() -> String {
    Columns::default().lemma
}

fn default_pos_column() -> String {
    Columns::default().pos
}

fn default_disambiguation_column() -> String {
    Columns::default().disambiguation
}

/// Training configuration.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainConfig {
    pub batch_size: usize,

    /// Maximum number of epochs.
    pub epochs: usize,

    /// Number of epochs without improvement before training stops.
    pub patience: usize,

    /// Shuffle the batch order in every epoch.
    pub shuffle: bool,

    pub seed: u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig {
            batch_size: 50,
            epochs: 5,
            patience: 3,
            shuffle: false,
            seed: 42,
        }
    }
}

/// Data split configuration.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatasetConfig {
    /// Fraction of sentences used for development data.
    pub dev: f32,

    /// Fraction of sentences used for test data.
    pub test: f32,

    pub seed: u64,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        DatasetConfig {
            dev: 0.1,
            test: 0.1,
            seed: 42,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    /// The filename of the model archive.
    pub archive: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            archive: "tarte.model".to_owned(),
        }
    }
}

fn relativize_path(config_path: &Path, filename: &str) -> Result<String, Error> {
    if filename.is_empty() {
        return Ok(filename.to_owned());
    }

    let path = Path::new(&filename);

    // Don't touch absolute paths.
    if path.is_absolute() {
        return Ok(filename.to_owned());
    }

    let abs_config_path = config_path.canonicalize()?;
    Ok(abs_config_path
        .parent()
        .ok_or_else(|| {
            format_err!(
                "Cannot get parent path of the configuration file: {}",
                abs_config_path.to_string_lossy()
            )
        })?
        .join(path)
        .to_str()
        .ok_or_else(|| {
            format_err!(
                "Cannot convert parent path to string: {}",
                abs_config_path.to_string_lossy()
            )
        })?
        .to_owned())
}

#[cfg(test)]
mod tests {
    use std::fs::File;
    use std::io::Cursor;
    use std::path::Path;

    use lazy_static::lazy_static;

    use super::{
        Config, ConfigError, DatasetConfig, ModelConfig, ReaderConfig, TomlRead, TrainConfig,
    };

    lazy_static! {
        static ref BASIC_CONFIG_CHECK: Config = Config {
            reader: ReaderConfig {
                separator: '\t',
                max_sent_len: Some(100),
                lemma: "lemma".to_owned(),
                pos: "POS".to_owned(),
                disambiguation: "Dis".to_owned(),
            },
            train: TrainConfig {
                batch_size: 32,
                epochs: 20,
                patience: 4,
                shuffle: true,
                seed: 7,
            },
            dataset: DatasetConfig {
                dev: 0.05,
                test: 0.1,
                seed: 42,
            },
            model: ModelConfig {
                archive: "tarte.model".to_owned(),
            },
        };
    }

    #[test]
    fn parse_config() {
        let f = File::open("testdata/tarte.conf").unwrap();
        let config = Config::from_toml_read(f).unwrap();
        assert_eq!(*BASIC_CONFIG_CHECK, config);
    }

    #[test]
    fn defaults() {
        let config = Config::from_toml_read(Cursor::new("")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.reader.columns().disambiguation, "Dis");
        assert_eq!(config.train.batch_size, 50);
    }

    #[test]
    fn rejects_unknown_fields() {
        assert!(Config::from_toml_read(Cursor::new("[train]\nbatchsize = 5\n")).is_err());
    }

    #[test]
    fn rejects_invalid_values() {
        let err = Config::from_toml_read(Cursor::new("[train]\nbatch_size = 0\n")).unwrap_err();
        assert_eq!(
            err.downcast::<ConfigError>().unwrap(),
            ConfigError::InvalidBatchSize
        );

        let err =
            Config::from_toml_read(Cursor::new("[dataset]\ndev = 0.5\ntest = 0.5\n")).unwrap_err();
        assert_eq!(
            err.downcast::<ConfigError>().unwrap(),
            ConfigError::InvalidSplit {
                dev: 0.5,
                test: 0.5
            }
        );

        let err =
            Config::from_toml_read(Cursor::new("[reader]\nmax_sent_len = 0\n")).unwrap_err();
        assert_eq!(
            err.downcast::<ConfigError>().unwrap(),
            ConfigError::InvalidMaxSentLen
        );
    }

    #[test]
    fn relativize_paths() {
        let mut config = BASIC_CONFIG_CHECK.clone();
        config.relativize_paths("testdata/tarte.conf").unwrap();

        let archive = Path::new(&config.model.archive);
        assert!(archive.is_absolute());
        assert!(archive.ends_with("testdata/tarte.model"));
    }
}
