//! RPR-FOM parameter encoding for the `WeaponFire` interaction.
//!
//! Each parameter is encoded independently, so a corrupt parameter can be
//! reported by name.  All multi-byte values are big-endian.  Fixed records
//! are packed field after field with no alignment padding.
//!
//! # Wire format
//!
//! ```text
//! EventIdentifier            [u16 event_count] [string issuing_object]
//! FireControlSolutionRange   [f32]
//! FireMissionIndex           [u32]
//! FiringLocation             [f64 x] [f64 y] [f64 z]
//! FiringObjectIdentifier     [string]
//! FuseType                   [u16 enum]
//! InitialVelocityVector      [f32 x] [f32 y] [f32 z]
//! MunitionObjectIdentifier   [string]
//! MunitionType               [u8 kind] [u8 domain] [u16 country]
//!                            [u8 category] [u8 subcategory] [u8 specific] [u8 extra]
//! QuantityFired              [u16]
//! RateOfFire                 [u16]
//! TargetObjectIdentifier     [string]
//! WarheadType                [u16 enum]
//!
//! string = [i32 unit_count] [u16 UTF-16 code unit] * unit_count
//! ```

use crate::{
    EntityType, EventIdentifier, Interaction, ParameterMap, VelocityVector, WeaponFireEvent,
    WorldLocation, EVENT_IDENTIFIER, FIRE_CONTROL_SOLUTION_RANGE, FIRE_MISSION_INDEX,
    FIRING_LOCATION, FIRING_OBJECT_IDENTIFIER, FUSE_TYPE, INITIAL_VELOCITY_VECTOR,
    MUNITION_OBJECT_IDENTIFIER, MUNITION_TYPE, QUANTITY_FIRED, RATE_OF_FIRE,
    TARGET_OBJECT_IDENTIFIER, WARHEAD_TYPE, WEAPON_FIRE,
};
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════
//  Errors
// ═══════════════════════════════════════════════════════════════════════

/// Why a single encoded field could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("truncated: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    #[error("{0} trailing bytes after value")]
    TrailingBytes(usize),

    #[error("negative string length {0}")]
    NegativeLength(i32),

    #[error("invalid UTF-16 string")]
    InvalidUtf16,
}

/// Why a whole `WeaponFire` payload was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("missing parameter {0}")]
    MissingParameter(&'static str),

    #[error("failed to decode {parameter}: {source}")]
    Field {
        parameter: &'static str,
        source: FieldError,
    },
}

impl DecodeError {
    /// Name of the offending parameter.
    pub fn parameter(&self) -> &'static str {
        match self {
            Self::MissingParameter(name) => name,
            Self::Field { parameter, .. } => parameter,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Field reader
// ═══════════════════════════════════════════════════════════════════════

/// Cursor over one encoded parameter value.
pub struct FieldReader<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> FieldReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, offset: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], FieldError> {
        let available = self.buf.len() - self.offset;
        if n > available {
            return Err(FieldError::Truncated {
                needed: n,
                available,
            });
        }
        let bytes = &self.buf[self.offset..self.offset + n];
        self.offset += n;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], FieldError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8, FieldError> {
        Ok(self.array::<1>()?[0])
    }

    pub fn u16(&mut self) -> Result<u16, FieldError> {
        self.array().map(u16::from_be_bytes)
    }

    pub fn i32(&mut self) -> Result<i32, FieldError> {
        self.array().map(i32::from_be_bytes)
    }

    pub fn u32(&mut self) -> Result<u32, FieldError> {
        self.array().map(u32::from_be_bytes)
    }

    pub fn f32(&mut self) -> Result<f32, FieldError> {
        self.array().map(f32::from_be_bytes)
    }

    pub fn f64(&mut self) -> Result<f64, FieldError> {
        self.array().map(f64::from_be_bytes)
    }

    pub fn unicode_string(&mut self) -> Result<String, FieldError> {
        let len = self.i32()?;
        if len < 0 {
            return Err(FieldError::NegativeLength(len));
        }
        let raw = self.take(len as usize * 2)?;
        let units: Vec<u16> = raw
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        String::from_utf16(&units).map_err(|_| FieldError::InvalidUtf16)
    }

    /// Require that the whole value was consumed.
    pub fn finish(self) -> Result<(), FieldError> {
        match self.buf.len() - self.offset {
            0 => Ok(()),
            rest => Err(FieldError::TrailingBytes(rest)),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Per-type codecs
// ═══════════════════════════════════════════════════════════════════════

/// A value that travels as a single RPR parameter.
pub trait FieldCodec: Sized {
    fn encode_into(&self, out: &mut Vec<u8>);
    fn decode_from(reader: &mut FieldReader<'_>) -> Result<Self, FieldError>;
}

impl FieldCodec for u16 {
    fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_be_bytes());
    }

    fn decode_from(reader: &mut FieldReader<'_>) -> Result<Self, FieldError> {
        reader.u16()
    }
}

impl FieldCodec for u32 {
    fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_be_bytes());
    }

    fn decode_from(reader: &mut FieldReader<'_>) -> Result<Self, FieldError> {
        reader.u32()
    }
}

impl FieldCodec for f32 {
    fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_be_bytes());
    }

    fn decode_from(reader: &mut FieldReader<'_>) -> Result<Self, FieldError> {
        reader.f32()
    }
}

impl FieldCodec for String {
    fn encode_into(&self, out: &mut Vec<u8>) {
        let units: Vec<u16> = self.encode_utf16().collect();
        out.extend_from_slice(&(units.len() as i32).to_be_bytes());
        for unit in units {
            out.extend_from_slice(&unit.to_be_bytes());
        }
    }

    fn decode_from(reader: &mut FieldReader<'_>) -> Result<Self, FieldError> {
        reader.unicode_string()
    }
}

impl FieldCodec for EventIdentifier {
    fn encode_into(&self, out: &mut Vec<u8>) {
        self.event_count.encode_into(out);
        self.issuing_object.encode_into(out);
    }

    fn decode_from(reader: &mut FieldReader<'_>) -> Result<Self, FieldError> {
        let event_count = reader.u16()?;
        let issuing_object = reader.unicode_string()?;
        Ok(Self {
            issuing_object,
            event_count,
        })
    }
}

impl FieldCodec for EntityType {
    fn encode_into(&self, out: &mut Vec<u8>) {
        out.push(self.kind);
        out.push(self.domain);
        out.extend_from_slice(&self.country.to_be_bytes());
        out.extend_from_slice(&[self.category, self.subcategory, self.specific, self.extra]);
    }

    fn decode_from(reader: &mut FieldReader<'_>) -> Result<Self, FieldError> {
        Ok(Self {
            kind: reader.u8()?,
            domain: reader.u8()?,
            country: reader.u16()?,
            category: reader.u8()?,
            subcategory: reader.u8()?,
            specific: reader.u8()?,
            extra: reader.u8()?,
        })
    }
}

impl FieldCodec for WorldLocation {
    fn encode_into(&self, out: &mut Vec<u8>) {
        for axis in self.axes() {
            out.extend_from_slice(&axis.to_be_bytes());
        }
    }

    fn decode_from(reader: &mut FieldReader<'_>) -> Result<Self, FieldError> {
        Ok(Self {
            x: reader.f64()?,
            y: reader.f64()?,
            z: reader.f64()?,
        })
    }
}

impl FieldCodec for VelocityVector {
    fn encode_into(&self, out: &mut Vec<u8>) {
        for axis in [self.x, self.y, self.z] {
            out.extend_from_slice(&axis.to_be_bytes());
        }
    }

    fn decode_from(reader: &mut FieldReader<'_>) -> Result<Self, FieldError> {
        Ok(Self {
            x: reader.f32()?,
            y: reader.f32()?,
            z: reader.f32()?,
        })
    }
}

/// Encode a single value as a standalone parameter.
pub fn encode_field<T: FieldCodec>(value: &T) -> Vec<u8> {
    let mut out = Vec::new();
    value.encode_into(&mut out);
    out
}

/// Decode a standalone parameter, rejecting trailing bytes.
pub fn decode_field<T: FieldCodec>(bytes: &[u8]) -> Result<T, FieldError> {
    let mut reader = FieldReader::new(bytes);
    let value = T::decode_from(&mut reader)?;
    reader.finish()?;
    Ok(value)
}

// ═══════════════════════════════════════════════════════════════════════
//  WeaponFire interaction
// ═══════════════════════════════════════════════════════════════════════

/// Encode a canonical event into a `WeaponFire` interaction.
pub fn encode_weapon_fire(event: &WeaponFireEvent) -> Interaction {
    let mut parameters = ParameterMap::new();
    let mut put = |name: &str, bytes: Vec<u8>| {
        parameters.insert(name.to_string(), bytes);
    };
    put(EVENT_IDENTIFIER, encode_field(&event.identifier));
    put(
        FIRE_CONTROL_SOLUTION_RANGE,
        encode_field(&event.fire_control_solution_range),
    );
    put(FIRE_MISSION_INDEX, encode_field(&event.fire_mission_index));
    put(FIRING_LOCATION, encode_field(&event.firing_location));
    put(FIRING_OBJECT_IDENTIFIER, encode_field(&event.firing_object_id));
    put(FUSE_TYPE, encode_field(&event.fuse_type));
    put(
        INITIAL_VELOCITY_VECTOR,
        encode_field(&event.initial_velocity_vector),
    );
    put(
        MUNITION_OBJECT_IDENTIFIER,
        encode_field(&event.munition_object_id),
    );
    put(MUNITION_TYPE, encode_field(&event.munition_type));
    put(QUANTITY_FIRED, encode_field(&event.quantity_fired));
    put(RATE_OF_FIRE, encode_field(&event.rate_of_fire));
    put(TARGET_OBJECT_IDENTIFIER, encode_field(&event.target_object_id));
    put(WARHEAD_TYPE, encode_field(&event.warhead_type));
    Interaction::new(WEAPON_FIRE, parameters)
}

/// Converts the encoded parameters of one interaction into a canonical
/// event.  Any failing parameter rejects the whole record.
pub trait WeaponFireDecoder: Send + Sync {
    fn decode(&self, parameters: &ParameterMap) -> Result<WeaponFireEvent, DecodeError>;
}

/// Decoder for the encoding described in the module docs.
#[derive(Debug, Clone, Copy, Default)]
pub struct RprDecoder;

impl WeaponFireDecoder for RprDecoder {
    fn decode(&self, parameters: &ParameterMap) -> Result<WeaponFireEvent, DecodeError> {
        Ok(WeaponFireEvent {
            identifier: parameter(parameters, EVENT_IDENTIFIER)?,
            fire_control_solution_range: parameter(parameters, FIRE_CONTROL_SOLUTION_RANGE)?,
            fire_mission_index: parameter(parameters, FIRE_MISSION_INDEX)?,
            firing_location: parameter(parameters, FIRING_LOCATION)?,
            firing_object_id: parameter(parameters, FIRING_OBJECT_IDENTIFIER)?,
            fuse_type: parameter(parameters, FUSE_TYPE)?,
            initial_velocity_vector: parameter(parameters, INITIAL_VELOCITY_VECTOR)?,
            munition_object_id: parameter(parameters, MUNITION_OBJECT_IDENTIFIER)?,
            munition_type: parameter(parameters, MUNITION_TYPE)?,
            quantity_fired: parameter(parameters, QUANTITY_FIRED)?,
            rate_of_fire: parameter(parameters, RATE_OF_FIRE)?,
            target_object_id: parameter(parameters, TARGET_OBJECT_IDENTIFIER)?,
            warhead_type: parameter(parameters, WARHEAD_TYPE)?,
        })
    }
}

fn parameter<T: FieldCodec>(
    parameters: &ParameterMap,
    name: &'static str,
) -> Result<T, DecodeError> {
    let bytes = parameters
        .get(name)
        .ok_or(DecodeError::MissingParameter(name))?;
    decode_field(bytes).map_err(|source| DecodeError::Field {
        parameter: name,
        source,
    })
}
