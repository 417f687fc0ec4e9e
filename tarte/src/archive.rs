//! Persisted models.
//!
//! A model archive is a tar archive with gzip-compressed members:
//!
//! * `label_encoder.zip`: vocabularies (JSON).
//! * `parameters.zip`: classifier constructor arguments (JSON).
//! * `weights.zip`: classifier weights (CBOR).
//! * `settings.zip`: training configuration (JSON), optional.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use failure::{Fail, Fallible, ResultExt};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use log::{info, warn};
use serde::de::DeserializeOwned;
use tar::{Archive, Builder, Header};

use crate::config::Config;
use crate::encoder::{MultiEncoder, SupervisedTargets};
use crate::model::Classifier;

pub const LABEL_ENCODER_MEMBER: &str = "label_encoder.zip";
pub const PARAMETERS_MEMBER: &str = "parameters.zip";
pub const WEIGHTS_MEMBER: &str = "weights.zip";
pub const SETTINGS_MEMBER: &str = "settings.zip";

/// Model archive load error.
#[derive(Clone, Debug, Eq, Fail, PartialEq)]
pub enum LoadError {
    /// A required archive member is absent.
    #[fail(display = "model archive does not contain '{}'", member)]
    MissingMember { member: String },
}

/// A trained model with its vocabularies.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelArchive<C, S = SupervisedTargets> {
    pub encoder: MultiEncoder<S>,
    pub classifier: C,
    pub settings: Option<Config>,
}

impl<C, S> ModelArchive<C, S>
where
    C: Classifier,
    S: Default,
{
    pub fn new(encoder: MultiEncoder<S>, classifier: C, settings: Option<Config>) -> Self {
        ModelArchive {
            encoder,
            classifier,
            settings,
        }
    }

    /// Read a model archive.
    ///
    /// The members are decoded in the order label encoder, parameters,
    /// weights, settings. The settings are optional, a settings member
    /// that cannot be read is reported and ignored.
    pub fn read<R>(read: R) -> Fallible<Self>
    where
        R: Read,
    {
        let mut members = HashMap::new();
        let mut archive = Archive::new(read);
        for entry in archive.entries()? {
            let mut entry = entry?;
            let name = entry.path()?.to_string_lossy().into_owned();
            let mut data = Vec::new();
            entry.read_to_end(&mut data)?;
            members.insert(name, data);
        }

        let encoder = MultiEncoder::loads(&String::from_utf8(decompress(
            &members,
            LABEL_ENCODER_MEMBER,
        )?)?)
        .context("Cannot load label encoder")?;

        let parameters: C::Parameters =
            decode_json(&decompress(&members, PARAMETERS_MEMBER)?)
                .context("Cannot load model parameters")?;

        let weights: C::Weights = serde_cbor::from_slice(&decompress(&members, WEIGHTS_MEMBER)?)
            .context("Cannot load model weights")?;

        let classifier = C::from_parts(parameters, weights)?;

        let settings = if members.contains_key(SETTINGS_MEMBER) {
            match decompress(&members, SETTINGS_MEMBER)
                .and_then(|data| decode_json::<Config>(&data))
            {
                Ok(settings) => Some(settings),
                Err(err) => {
                    warn!("Couldn't load settings for model: {}", err);
                    None
                }
            }
        } else {
            info!("Model archive does not contain settings");
            None
        };

        Ok(ModelArchive {
            encoder,
            classifier,
            settings,
        })
    }

    /// Load a model archive from a file.
    pub fn load(path: impl AsRef<Path>) -> Fallible<Self> {
        let path = path.as_ref();
        let f = File::open(path)
            .with_context(|e| format!("Cannot open model archive {}: {}", path.display(), e))?;
        Self::read(BufReader::new(f))
    }

    /// Write the model archive.
    ///
    /// Returns the inner writer.
    pub fn write<W>(&self, write: W) -> Fallible<W>
    where
        W: Write,
    {
        let mut builder = Builder::new(write);

        append_compressed(
            &mut builder,
            LABEL_ENCODER_MEMBER,
            self.encoder.dumps()?.as_bytes(),
        )?;
        append_compressed(
            &mut builder,
            PARAMETERS_MEMBER,
            &serde_json::to_vec(&self.classifier.parameters())?,
        )?;
        append_compressed(
            &mut builder,
            WEIGHTS_MEMBER,
            &serde_cbor::to_vec(self.classifier.weights())?,
        )?;

        if let Some(ref settings) = self.settings {
            append_compressed(&mut builder, SETTINGS_MEMBER, &serde_json::to_vec(settings)?)?;
        }

        Ok(builder.into_inner()?)
    }

    /// Save the model archive to a file.
    pub fn save(&self, path: impl AsRef<Path>) -> Fallible<()> {
        let path = path.as_ref();
        let f = File::create(path)
            .with_context(|e| format!("Cannot create model archive {}: {}", path.display(), e))?;
        self.write(BufWriter::new(f))?.flush()?;
        Ok(())
    }
}

fn append_compressed<W>(builder: &mut Builder<W>, name: &str, data: &[u8]) -> Fallible<()>
where
    W: Write,
{
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    let compressed = encoder.finish()?;

    let mut header = Header::new_gnu();
    header.set_size(compressed.len() as u64);
    header.set_mode(0o644);
    builder.append_data(&mut header, name, compressed.as_slice())?;

    Ok(())
}

fn decompress(members: &HashMap<String, Vec<u8>>, name: &str) -> Fallible<Vec<u8>> {
    let compressed = members.get(name).ok_or_else(|| LoadError::MissingMember {
        member: name.to_owned(),
    })?;

    let mut data = Vec::new();
    GzDecoder::new(compressed.as_slice())
        .read_to_end(&mut data)
        .with_context(|e| format!("Cannot decompress {}: {}", name, e))?;

    Ok(data)
}

fn decode_json<T>(data: &[u8]) -> Fallible<T>
where
    T: DeserializeOwned,
{
    Ok(serde_json::from_slice(data)?)
}
