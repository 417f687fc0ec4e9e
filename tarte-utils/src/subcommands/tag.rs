use std::io::{BufRead, BufWriter, Write};
use std::rc::Rc;
use std::slice;

use clap::{App, Arg, ArgMatches};
use failure::{format_err, Fallible};
use log::info;
use stdinout::{Input, OrExit, Output};
use tarte::io::{Context, TsvReader, TsvWriter};
use tarte::model::MostFrequentVariant;
use tarte::{Accuracy, ModelArchive, Tag, Tagger};

use crate::progress::TaggerSpeed;
use crate::traits::TarteApp;

static ARCHIVE: &str = "ARCHIVE";
static EVALUATE: &str = "EVALUATE";
static INPUT: &str = "INPUT";
static OUTPUT: &str = "OUTPUT";

pub struct TagApp {
    archive: String,
    evaluate: bool,
    input: Option<String>,
    output: Option<String>,
}

impl TagApp {
    fn process<R, W>(
        &self,
        tagger: &Tagger<MostFrequentVariant>,
        reader: TsvReader<R>,
        mut writer: TsvWriter<W>,
    ) -> Fallible<Option<Accuracy>>
    where
        R: BufRead,
        W: Write,
    {
        let mut speed = TaggerSpeed::new();
        let mut accuracy = Accuracy::default();

        for sentence in reader {
            let mut sentence = sentence?;

            if self.evaluate {
                let columns = tagger.columns();
                let gold = sentence.column(&columns.disambiguation).ok_or_else(|| {
                    format_err!(
                        "Cannot evaluate, input does not have a '{}' column",
                        columns.disambiguation
                    )
                })?;
                let context = Rc::new(Context::from_sentence("<input>", &sentence, columns)?);
                accuracy.merge(tagger.evaluate(&context, gold)?);
            }

            tagger.tag_sentences(slice::from_mut(&mut sentence))?;
            writer.write_sentence(&sentence)?;

            speed.count_sentence();
        }

        writer.flush()?;

        Ok(if self.evaluate { Some(accuracy) } else { None })
    }
}

impl TarteApp for TagApp {
    fn app() -> App<'static, 'static> {
        App::new("tag")
            .about("Disambiguate lemmas with a model")
            .arg(
                Arg::with_name(ARCHIVE)
                    .help("Model archive")
                    .index(1)
                    .required(true),
            )
            .arg(
                Arg::with_name(INPUT)
                    .help("Input data")
                    .long("input")
                    .takes_value(true),
            )
            .arg(
                Arg::with_name(OUTPUT)
                    .help("Output data")
                    .long("output")
                    .takes_value(true),
            )
            .arg(
                Arg::with_name(EVALUATE)
                    .help("Report accuracy against the gold disambiguation column")
                    .long("evaluate"),
            )
    }

    fn parse(matches: &ArgMatches) -> Self {
        let archive = matches.value_of(ARCHIVE).unwrap().into();
        let evaluate = matches.is_present(EVALUATE);
        let input = matches.value_of(INPUT).map(ToOwned::to_owned);
        let output = matches.value_of(OUTPUT).map(ToOwned::to_owned);

        TagApp {
            archive,
            evaluate,
            input,
            output,
        }
    }

    fn run(&self) {
        let archive: ModelArchive<MostFrequentVariant> =
            ModelArchive::load(&self.archive).or_exit("Cannot load model archive", 1);
        let reader_config = archive
            .settings
            .as_ref()
            .map(|settings| settings.reader.clone())
            .unwrap_or_default();
        let tagger = Tagger::from_archive(archive);

        let input = Input::from(self.input.as_ref());
        let reader = TsvReader::new(
            input.buf_read().or_exit("Cannot open input for reading", 1),
            self.input.as_ref().map(String::as_str).unwrap_or("<stdin>"),
        )
        .separator(reader_config.separator);

        let output = Output::from(self.output.as_ref());
        let writer = TsvWriter::new(BufWriter::new(
            output.write().or_exit("Cannot open output for writing", 1),
        ))
        .separator(reader_config.separator);

        if let Some(accuracy) = self
            .process(&tagger, reader, writer)
            .or_exit("Cannot disambiguate lemmas", 1)
        {
            info!(
                "Accuracy: {:.4} ({}/{} sites)",
                accuracy.accuracy(),
                accuracy.correct,
                accuracy.total
            );
        }
    }
}
