use clap::{App, Arg, ArgMatches};
use failure::Fallible;
use log::info;
use stdinout::OrExit;
use tarte::encoder::{EncodeMode, MultiEncoder};
use tarte::io::{DisambiguationReader, ReadSentences};
use tarte::model::{FrequencyParameters, MostFrequentVariant};
use tarte::{BatchOptions, Classifier, Config, ConfigError, DataSet, ModelArchive};

use crate::progress::epoch_progress;
use crate::traits::{TarteApp, TarteConfigApp};

static DEVICE: &str = "DEVICE";
static TRAIN_DATA: &str = "TRAIN_DATA";
static VALIDATION_DATA: &str = "VALIDATION_DATA";

pub struct TrainApp {
    config: String,
    train_data: String,
    validation_data: String,
}

impl TrainApp {
    fn batch_options(config: &Config, epoch: usize, is_training: bool) -> BatchOptions {
        if !is_training {
            return BatchOptions::new(config.train.batch_size, EncodeMode::Lookup);
        }

        let options = BatchOptions::new(config.train.batch_size, EncodeMode::Register);
        if config.train.shuffle {
            options.shuffle(config.train.seed.wrapping_add(epoch as u64))
        } else {
            options
        }
    }

    fn run_epoch<C, R>(
        reader: &DisambiguationReader<R>,
        encoder: &mut MultiEncoder,
        classifier: &mut C,
        n_sites: usize,
        options: BatchOptions,
        is_training: bool,
    ) -> Fallible<(f32, f32)>
    where
        C: Classifier,
        R: ReadSentences,
    {
        let epoch_type = if is_training { "train" } else { "validation" };
        let progress_bar = epoch_progress(n_sites, epoch_type);

        let mut instances = 0;
        let mut acc = 0f32;
        let mut loss = 0f32;

        for batch in reader.batches(encoder, options)? {
            let (inputs, labels) = batch?.into_parts();

            let batch_perf = if is_training {
                classifier.train(&inputs, &labels)?
            } else {
                classifier.validate(&inputs, &labels)?
            };

            let n_examples = inputs.len();
            loss += n_examples as f32 * batch_perf.loss;
            acc += n_examples as f32 * batch_perf.accuracy;
            instances += n_examples;

            progress_bar.inc(n_examples as u64);
            progress_bar.set_message(&format!(
                "batch loss: {:.4}, batch accuracy: {:.4}",
                batch_perf.loss, batch_perf.accuracy
            ));
        }

        progress_bar.finish();

        if instances == 0 {
            return Ok((0., 0.));
        }

        Ok((loss / instances as f32, acc / instances as f32))
    }

    fn train(&self, config: &Config) -> Fallible<()> {
        let mut train_reader = config.reader.reader(vec![&self.train_data]);
        let mut validation_reader = config.reader.reader(vec![&self.validation_data]);

        let mut encoder: MultiEncoder = MultiEncoder::default();
        let n_train = encoder.fit_reader(&train_reader)?;
        if n_train == 0 {
            return Err(ConfigError::EmptyLoss.into());
        }

        info!(
            "Vocabularies: {} lemmas, {} tokens, {} tags, {} characters, {} outputs",
            encoder.lemma().size(),
            encoder.token().size(),
            encoder.pos().size(),
            encoder.chars().size(),
            encoder.output().size()
        );
        info!(
            "{} lemmas need disambiguation",
            encoder.need_categorization().len()
        );

        let n_train = train_reader.nsents()?;
        let n_validation = validation_reader.nsents()?;
        info!(
            "Disambiguation sites: {} train, {} validation",
            n_train, n_validation
        );

        let mut classifier =
            MostFrequentVariant::new(FrequencyParameters::new(encoder.output().size()));

        let mut best = None;
        let mut best_epoch = 0;
        let mut best_acc = 0.0;

        for epoch in 0..config.train.epochs {
            let (loss, acc) = Self::run_epoch(
                &train_reader,
                &mut encoder,
                &mut classifier,
                n_train,
                Self::batch_options(config, epoch, true),
                true,
            )?;

            info!("Epoch {} (train): loss: {:.4}, acc: {:.4}", epoch, loss, acc);

            let (loss, acc) = Self::run_epoch(
                &validation_reader,
                &mut encoder,
                &mut classifier,
                n_validation,
                Self::batch_options(config, epoch, false),
                false,
            )?;

            if best.is_none() || acc > best_acc {
                best = Some(classifier.clone());
                best_epoch = epoch;
                best_acc = acc;
            }

            let epoch_status = if best_epoch == epoch { "*" } else { "" };

            info!(
                "Epoch {} (validation): loss: {:.4}, acc: {:.4}, best epoch: {}, best acc: {:.4} {}",
                epoch, loss, acc, best_epoch, best_acc, epoch_status
            );

            if epoch - best_epoch == config.train.patience {
                info!(
                    "Lost my patience! Best epoch: {} with accuracy: {:.4}",
                    best_epoch, best_acc
                );
                break;
            }
        }

        let archive = ModelArchive::new(
            encoder,
            best.unwrap_or(classifier),
            Some(config.clone()),
        );
        archive.save(&config.model.archive)?;
        info!("Saved model to {}", config.model.archive);

        Ok(())
    }
}

fn check_device(device: &str) -> Result<(), ConfigError> {
    match device {
        "cpu" => Ok(()),
        _ => Err(ConfigError::UnsupportedDevice {
            device: device.to_owned(),
        }),
    }
}

impl TarteConfigApp for TrainApp {}

impl TarteApp for TrainApp {
    fn app() -> App<'static, 'static> {
        Self::config_app("train")
            .about("Train a disambiguation model")
            .arg(
                Arg::with_name(TRAIN_DATA)
                    .help("Training data")
                    .index(2)
                    .required(true),
            )
            .arg(
                Arg::with_name(VALIDATION_DATA)
                    .help("Validation data")
                    .index(3)
                    .required(true),
            )
            .arg(
                Arg::with_name(DEVICE)
                    .long("device")
                    .value_name("DEVICE")
                    .help("Device to train on")
                    .default_value("cpu"),
            )
    }

    fn parse(matches: &ArgMatches) -> Self {
        let config = matches.value_of(Self::CONFIG).unwrap().into();
        let train_data = matches.value_of(TRAIN_DATA).unwrap().into();
        let validation_data = matches.value_of(VALIDATION_DATA).unwrap().into();

        check_device(matches.value_of(DEVICE).unwrap()).or_exit("Cannot use device", 1);

        TrainApp {
            config,
            train_data,
            validation_data,
        }
    }

    fn run(&self) {
        let config = Self::load_config(&self.config);
        self.train(&config).or_exit("Cannot train model", 1);
    }
}

#[cfg(test)]
mod tests {
    use tarte::ConfigError;

    use super::check_device;

    #[test]
    fn only_cpu_is_supported() {
        assert!(check_device("cpu").is_ok());
        assert_eq!(
            check_device("cuda"),
            Err(ConfigError::UnsupportedDevice {
                device: "cuda".to_owned()
            })
        );
    }
}
