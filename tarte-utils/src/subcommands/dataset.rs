use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use clap::{App, Arg, ArgMatches};
use failure::{Fallible, ResultExt};
use log::info;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xorshift::XorShiftRng;
use stdinout::OrExit;
use tarte::config::DatasetConfig;
use tarte::io::{
    derive_disambiguation, is_disambiguation_site, DisambiguationTable, RawSentence,
    ReadSentences, TsvWriter,
};
use tarte::Config;

use crate::traits::{TarteApp, TarteConfigApp};

static FILES: &str = "FILES";
static OUTPUT: &str = "OUTPUT";
static TABLE: &str = "TABLE";

static TABLE_FILENAME: &str = "disambiguation.tsv";

/// Data split names, in the order in which they are filled.
static SPLITS: &[&str] = &["test", "dev", "train"];

pub struct DatasetApp {
    config: String,
    files: Vec<String>,
    output: Option<String>,
    table: bool,
}

impl DatasetApp {
    /// Read the corpus and derive the disambiguation column.
    fn scan(&self, config: &Config) -> Fallible<(Vec<RawSentence>, DisambiguationTable)> {
        let reader = &config.reader;
        let corpus = reader.corpus(&self.files);

        let mut sentences = Vec::new();
        let mut table = DisambiguationTable::new();
        let mut n_sites = 0;

        for sentence in corpus.sentences()? {
            let (path, sentence) = sentence?;
            let sentence = derive_disambiguation(&sentence, &reader.lemma, &reader.disambiguation)
                .with_context(|e| format!("Cannot derive disambiguation in {}: {}", path, e))?;

            table.add(&sentence, &reader.lemma, &reader.disambiguation)?;
            n_sites += sentence
                .column(&reader.disambiguation)
                .map(|codes| codes.iter().filter(|code| is_disambiguation_site(code)).count())
                .unwrap_or(0);

            sentences.push(sentence);
        }

        info!(
            "{} sentences, {} disambiguation sites, {} lemma variants",
            sentences.len(),
            n_sites,
            table.len()
        );

        Ok((sentences, table))
    }

    fn dispatch(&self, config: &Config, sentences: &[RawSentence], output: &Path) -> Fallible<()> {
        fs::create_dir_all(output)
            .with_context(|e| format!("Cannot create directory {}: {}", output.display(), e))?;

        let splits = split_indices(sentences.len(), &config.dataset);
        for (name, indices) in SPLITS.iter().zip(splits) {
            let path = output.join(format!("{}.tsv", name));
            let f = File::create(&path)
                .with_context(|e| format!("Cannot create {}: {}", path.display(), e))?;
            let mut writer = TsvWriter::new(BufWriter::new(f)).separator(config.reader.separator);

            for &idx in &indices {
                writer.write_sentence(&sentences[idx])?;
            }
            writer.flush()?;

            info!("Wrote {} sentences to {}", indices.len(), path.display());
        }

        Ok(())
    }

    fn write_table(&self, table: &DisambiguationTable) -> Fallible<()> {
        let path = match self.output {
            Some(ref output) => PathBuf::from(output).join(TABLE_FILENAME),
            None => PathBuf::from(TABLE_FILENAME),
        };

        let f = File::create(&path)
            .with_context(|e| format!("Cannot create {}: {}", path.display(), e))?;
        table.write(BufWriter::new(f))?;
        info!("Wrote disambiguation table to {}", path.display());

        Ok(())
    }
}

/// Assign sentence indices to the test, development, and training splits.
///
/// Sentences are shuffled with the configured seed. Every split keeps
/// corpus order.
fn split_indices(n_sentences: usize, config: &DatasetConfig) -> Vec<Vec<usize>> {
    let mut indices = (0..n_sentences).collect::<Vec<_>>();
    let mut rng = XorShiftRng::seed_from_u64(config.seed);
    indices.shuffle(&mut rng);

    let n_test = (n_sentences as f32 * config.test).round() as usize;
    let n_dev = ((n_sentences as f32 * config.dev).round() as usize).min(n_sentences - n_test);

    let mut train = indices.split_off(n_test + n_dev);
    let mut dev = indices.split_off(n_test);
    let mut test = indices;

    test.sort();
    dev.sort();
    train.sort();

    vec![test, dev, train]
}

impl TarteConfigApp for DatasetApp {}

impl TarteApp for DatasetApp {
    fn app() -> App<'static, 'static> {
        Self::config_app("dataset")
            .about("Derive disambiguation data and optionally split it for training")
            .arg(
                Arg::with_name(FILES)
                    .help("Corpus files")
                    .index(2)
                    .min_values(1)
                    .required(true),
            )
            .arg(
                Arg::with_name(OUTPUT)
                    .long("output")
                    .value_name("DIR")
                    .help("Write train, dev, and test data to this directory"),
            )
            .arg(
                Arg::with_name(TABLE)
                    .long("table")
                    .help("Write a table of lemma variants"),
            )
    }

    fn parse(matches: &ArgMatches) -> Self {
        let config = matches.value_of(Self::CONFIG).unwrap().into();
        let files = matches
            .values_of(FILES)
            .unwrap()
            .map(ToOwned::to_owned)
            .collect();
        let output = matches.value_of(OUTPUT).map(ToOwned::to_owned);
        let table = matches.is_present(TABLE);

        DatasetApp {
            config,
            files,
            output,
            table,
        }
    }

    fn run(&self) {
        let config = Self::load_config(&self.config);

        let (sentences, table) = self.scan(&config).or_exit("Cannot read corpus", 1);

        if self.table {
            self.write_table(&table)
                .or_exit("Cannot write disambiguation table", 1);
        }

        if let Some(ref output) = self.output {
            self.dispatch(&config, &sentences, Path::new(output))
                .or_exit("Cannot write data splits", 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use tarte::config::DatasetConfig;

    use super::split_indices;

    #[test]
    fn splits_partition_sentences() {
        let config = DatasetConfig {
            dev: 0.1,
            test: 0.2,
            seed: 13,
        };

        let splits = split_indices(20, &config);
        assert_eq!(
            splits.iter().map(Vec::len).collect::<Vec<_>>(),
            vec![4, 2, 14]
        );

        let mut all = splits.concat();
        all.sort();
        assert_eq!(all, (0..20).collect::<Vec<_>>());

        for split in &splits {
            assert!(split.windows(2).all(|w| w[0] < w[1]));
        }

        assert_eq!(splits, split_indices(20, &config));
    }

    #[test]
    fn small_corpora_go_to_train() {
        let config = DatasetConfig::default();
        let splits = split_indices(3, &config);
        assert_eq!(splits, vec![vec![], vec![], vec![0, 1, 2]]);
    }
}
