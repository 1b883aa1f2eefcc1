//! Native GRIB2 (edition 2) decoding for regular lat/lon grids.
//!
//! Scope is the subset of GRIB2 the map pipeline consumes: grid definition
//! template 3.0, product definition templates 4.0/4.8, and simple packing
//! (data representation template 5.0) with an optional bitmap. A file is a
//! sequence of self-delimiting messages; [`Grib2Reader`] walks them and
//! [`Grib2Message::unpack`] yields a [`GridField`] with NaN at missing
//! points.

use bytes::Bytes;
use thiserror::Error;

use map_common::{GridField, MapError, Product};

pub mod sections;
pub mod tables;
pub mod unpacking;

pub use sections::{
    DataRepresentation, GridDefinition, Identification, Indicator, ProductDefinition,
    SectionIndex,
};
pub use tables::{level_description, ParameterId};

/// Errors raised while decoding GRIB2 data.
#[derive(Debug, Error)]
pub enum Grib2Error {
    #[error("not a GRIB message: bad magic bytes")]
    InvalidMagic,

    #[error("unsupported GRIB edition {0}, only edition 2 is handled")]
    UnsupportedEdition(u8),

    #[error("message truncated: declared {declared} bytes, {available} available")]
    TruncatedMessage { declared: usize, available: usize },

    #[error("required section {0} missing from message")]
    MissingSection(u8),

    #[error("unsupported template {template} in section {section}")]
    UnsupportedTemplate { section: u8, template: u16 },

    #[error("malformed section {section}: {reason}")]
    MalformedSection { section: u8, reason: String },

    #[error("failed to unpack data: {0}")]
    UnpackingError(String),
}

impl From<Grib2Error> for MapError {
    fn from(err: Grib2Error) -> Self {
        MapError::GribError(err.to_string())
    }
}

pub type Grib2Result<T> = Result<T, Grib2Error>;

/// One parsed GRIB2 message. Metadata sections are decoded eagerly; the
/// packed data section is held as a slice of the message bytes and only
/// expanded by [`unpack`](Self::unpack).
#[derive(Debug, Clone)]
pub struct Grib2Message {
    data: Bytes,
    index: SectionIndex,
    pub indicator: Indicator,
    pub identification: Identification,
    pub grid: GridDefinition,
    pub product: ProductDefinition,
    pub representation: DataRepresentation,
}

impl Grib2Message {
    /// Parse a complete message from its raw bytes (starting at "GRIB").
    pub fn parse(data: Bytes) -> Grib2Result<Self> {
        let indicator = sections::parse_indicator(&data)?;
        let index = sections::walk_sections(&data)?;

        let identification = sections::parse_identification(&data, &index)?;
        let grid = sections::parse_grid_definition(&data, &index)?;
        let product = sections::parse_product_definition(&data, &index, indicator.discipline)?;
        let representation = sections::parse_data_representation(&data, &index)?;

        Ok(Self {
            data,
            index,
            indicator,
            identification,
            grid,
            product,
            representation,
        })
    }

    /// The (discipline, category, number) triple identifying the parameter.
    pub fn parameter(&self) -> ParameterId {
        ParameterId {
            discipline: self.indicator.discipline,
            category: self.product.parameter_category,
            number: self.product.parameter_number,
        }
    }

    /// Short parameter name, e.g. "TMP" or "PRMSL".
    pub fn short_name(&self) -> String {
        self.parameter().short_name()
    }

    /// Human-readable level, e.g. "2 m above ground".
    pub fn level_description(&self) -> String {
        level_description(self.product.level_type, self.product.level_value())
    }

    /// Whether this message carries the given parameter on the given level.
    /// `level_value` is compared only when the selector specifies one.
    pub fn matches(
        &self,
        selector: (u8, u8, u8),
        level_type: Option<u8>,
        level_value: Option<f64>,
    ) -> bool {
        let param = self.parameter();
        if (param.discipline, param.category, param.number) != selector {
            return false;
        }
        if let Some(lt) = level_type {
            if self.product.level_type != lt {
                return false;
            }
        }
        if let Some(lv) = level_value {
            if (self.product.level_value() - lv).abs() > 1e-6 {
                return false;
            }
        }
        true
    }

    /// Expand the packed data into a grid field. Bitmap-missing points come
    /// out as NaN.
    pub fn unpack(&self) -> Grib2Result<GridField> {
        if self.representation.template != 0 {
            return Err(Grib2Error::UnsupportedTemplate {
                section: 5,
                template: self.representation.template,
            });
        }

        let geometry = self.grid.geometry()?;
        let bitmap = self.bitmap_bits()?;
        let packed = &self.data[self.index.data_body.clone()];

        let values = unpacking::unpack_simple(
            packed,
            geometry.len(),
            &self.representation,
            bitmap,
        )?;

        GridField::new(geometry, values).map_err(|e| Grib2Error::MalformedSection {
            section: 7,
            reason: e.to_string(),
        })
    }

    /// Bitmap bits when section 6 carries one, `None` when indicator 255
    /// declares the field complete.
    fn bitmap_bits(&self) -> Grib2Result<Option<&[u8]>> {
        match self.index.bitmap_indicator {
            255 => Ok(None),
            0 => {
                let range = self
                    .index
                    .bitmap_body
                    .clone()
                    .ok_or(Grib2Error::MissingSection(6))?;
                Ok(Some(&self.data[range]))
            }
            254 => Err(Grib2Error::MalformedSection {
                section: 6,
                reason: "bitmap reuse (indicator 254) is not supported".to_string(),
            }),
            other => Err(Grib2Error::MalformedSection {
                section: 6,
                reason: format!("predefined bitmap {} is not supported", other),
            }),
        }
    }
}

/// Iterates over the messages in a GRIB2 file.
///
/// Bad messages yield `Some(Err(..))` and the reader skips forward to the
/// next "GRIB" magic, so one corrupt message does not end iteration.
pub struct Grib2Reader {
    data: Bytes,
    offset: usize,
}

impl Grib2Reader {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            offset: 0,
        }
    }

    /// Advance to the next message, if any.
    pub fn next_message(&mut self) -> Option<Grib2Result<Grib2Message>> {
        let start = find_magic(&self.data, self.offset)?;

        if self.data.len() - start < 16 {
            self.offset = self.data.len();
            return Some(Err(Grib2Error::TruncatedMessage {
                declared: 16,
                available: self.data.len() - start,
            }));
        }

        let declared = u64::from_be_bytes(
            self.data[start + 8..start + 16]
                .try_into()
                .unwrap_or([0; 8]),
        ) as usize;

        if declared < 16 || start + declared > self.data.len() {
            // Skip past this magic so iteration can resync on the next one.
            self.offset = start + 4;
            return Some(Err(Grib2Error::TruncatedMessage {
                declared,
                available: self.data.len() - start,
            }));
        }

        let raw = self.data.slice(start..start + declared);
        self.offset = start + declared;

        if &raw[declared - 4..] != b"7777" {
            return Some(Err(Grib2Error::MalformedSection {
                section: 8,
                reason: "message does not end with 7777".to_string(),
            }));
        }

        Some(Grib2Message::parse(raw))
    }

    /// Decode every well-formed message, collecting parse errors aside.
    pub fn read_all(mut self) -> (Vec<Grib2Message>, Vec<Grib2Error>) {
        let mut messages = Vec::new();
        let mut errors = Vec::new();
        while let Some(result) = self.next_message() {
            match result {
                Ok(m) => messages.push(m),
                Err(e) => {
                    tracing::debug!(error = %e, "skipping undecodable GRIB2 message");
                    errors.push(e);
                }
            }
        }
        (messages, errors)
    }
}

impl Iterator for Grib2Reader {
    type Item = Grib2Result<Grib2Message>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_message()
    }
}

/// Locate the message carrying `product`, honoring its level constraints.
pub fn find_product<'a>(messages: &'a [Grib2Message], product: Product) -> Option<&'a Grib2Message> {
    let selector = product.grib_selector();
    let level_type = product.level_type();
    let level_value = product.level_value();
    messages
        .iter()
        .find(|m| m.matches(selector, level_type, level_value))
        .or_else(|| {
            // Fall back to parameter-only match when no message sits on the
            // preferred level (some feeds publish e.g. APCP on level 103).
            messages.iter().find(|m| m.matches(selector, None, None))
        })
}

fn find_magic(data: &[u8], from: usize) -> Option<usize> {
    if from >= data.len() {
        return None;
    }
    data[from..]
        .windows(4)
        .position(|w| w == b"GRIB")
        .map(|p| from + p)
}
