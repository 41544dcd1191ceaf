//! Typed settings records and their flat little-endian images.
//!
//! Every record is a fixed-size byte image so a partially migrated store
//! is detectable by length alone. Strings are zero-padded ASCII slots,
//! like the zone store's id/name fields.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("record has {actual} bytes, expected {expected}")]
    Length { expected: usize, actual: usize },
    #[error("record string field is not valid UTF-8")]
    BadString,
}

fn write_padded_str(buf: &mut Vec<u8>, s: &str, slot: usize) {
    let mut bytes = vec![0u8; slot];
    let n = s.len().min(slot);
    bytes[..n].copy_from_slice(&s.as_bytes()[..n]);
    buf.extend_from_slice(&bytes);
}

fn read_padded_str(bytes: &[u8]) -> Result<String, RecordError> {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    std::str::from_utf8(&bytes[..end])
        .map(|s| s.to_string())
        .map_err(|_| RecordError::BadString)
}

fn check_len(bytes: &[u8], expected: usize) -> Result<(), RecordError> {
    if bytes.len() != expected {
        return Err(RecordError::Length {
            expected,
            actual: bytes.len(),
        });
    }
    Ok(())
}

/// Device identity-adjacent settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    pub name: String,
    /// Pro hardware carries both radars and runs the TDM controller.
    pub pro_hardware: bool,
    pub telemetry_interval_s: u16,
}

impl DeviceRecord {
    pub const IMAGE_LEN: usize = 32 + 1 + 2;

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::IMAGE_LEN);
        write_padded_str(&mut buf, &self.name, 32);
        buf.push(self.pro_hardware as u8);
        buf.write_u16::<LittleEndian>(self.telemetry_interval_s)
            .unwrap();
        buf
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RecordError> {
        check_len(bytes, Self::IMAGE_LEN)?;
        let name = read_padded_str(&bytes[..32])?;
        let mut rdr = std::io::Cursor::new(&bytes[32..]);
        Ok(DeviceRecord {
            name,
            pro_hardware: rdr.read_u8().unwrap() != 0,
            telemetry_interval_s: rdr.read_u16::<LittleEndian>().unwrap(),
        })
    }
}

impl Default for DeviceRecord {
    fn default() -> Self {
        DeviceRecord {
            name: "rs1".to_string(),
            pro_hardware: false,
            telemetry_interval_s: 60,
        }
    }
}

/// Wi-Fi credentials. Stored encrypted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkRecord {
    pub ssid: String,
    pub psk: String,
    pub use_dhcp: bool,
    pub static_ip: [u8; 4],
    pub gateway: [u8; 4],
    pub netmask: [u8; 4],
}

impl NetworkRecord {
    pub const IMAGE_LEN: usize = 32 + 64 + 1 + 12;

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::IMAGE_LEN);
        write_padded_str(&mut buf, &self.ssid, 32);
        write_padded_str(&mut buf, &self.psk, 64);
        buf.push(self.use_dhcp as u8);
        buf.extend_from_slice(&self.static_ip);
        buf.extend_from_slice(&self.gateway);
        buf.extend_from_slice(&self.netmask);
        buf
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RecordError> {
        check_len(bytes, Self::IMAGE_LEN)?;
        Ok(NetworkRecord {
            ssid: read_padded_str(&bytes[..32])?,
            psk: read_padded_str(&bytes[32..96])?,
            use_dhcp: bytes[96] != 0,
            static_ip: bytes[97..101].try_into().unwrap(),
            gateway: bytes[101..105].try_into().unwrap(),
            netmask: bytes[105..109].try_into().unwrap(),
        })
    }
}

/// Local API credentials. Stored encrypted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityRecord {
    pub api_token: [u8; 32],
    pub pairing_pin: u32,
}

impl SecurityRecord {
    pub const IMAGE_LEN: usize = 32 + 4;

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::IMAGE_LEN);
        buf.extend_from_slice(&self.api_token);
        buf.write_u32::<LittleEndian>(self.pairing_pin).unwrap();
        buf
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RecordError> {
        check_len(bytes, Self::IMAGE_LEN)?;
        Ok(SecurityRecord {
            api_token: bytes[..32].try_into().unwrap(),
            pairing_pin: u32::from_le_bytes(bytes[32..36].try_into().unwrap()),
        })
    }
}

impl Default for SecurityRecord {
    fn default() -> Self {
        SecurityRecord {
            api_token: [0; 32],
            pairing_pin: 0,
        }
    }
}

/// Mounting geometry for coordinate correction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalibrationRecord {
    pub install_height_mm: u16,
    /// Sensor tilt in hundredths of a degree.
    pub tilt_centideg: i16,
    pub x_offset_mm: i16,
    pub y_offset_mm: i16,
}

impl CalibrationRecord {
    pub const IMAGE_LEN: usize = 8;

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::IMAGE_LEN);
        buf.write_u16::<LittleEndian>(self.install_height_mm).unwrap();
        buf.write_i16::<LittleEndian>(self.tilt_centideg).unwrap();
        buf.write_i16::<LittleEndian>(self.x_offset_mm).unwrap();
        buf.write_i16::<LittleEndian>(self.y_offset_mm).unwrap();
        buf
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RecordError> {
        check_len(bytes, Self::IMAGE_LEN)?;
        let mut rdr = std::io::Cursor::new(bytes);
        Ok(CalibrationRecord {
            install_height_mm: rdr.read_u16::<LittleEndian>().unwrap(),
            tilt_centideg: rdr.read_i16::<LittleEndian>().unwrap(),
            x_offset_mm: rdr.read_i16::<LittleEndian>().unwrap(),
            y_offset_mm: rdr.read_i16::<LittleEndian>().unwrap(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_record_roundtrip() {
        let rec = DeviceRecord {
            name: "living_room".to_string(),
            pro_hardware: true,
            telemetry_interval_s: 30,
        };
        let bytes = rec.to_bytes();
        assert_eq!(bytes.len(), DeviceRecord::IMAGE_LEN);
        assert_eq!(DeviceRecord::from_bytes(&bytes).unwrap(), rec);
    }

    #[test]
    fn network_record_roundtrip() {
        let rec = NetworkRecord {
            ssid: "homenet".to_string(),
            psk: "correct horse battery staple".to_string(),
            use_dhcp: false,
            static_ip: [192, 168, 1, 40],
            gateway: [192, 168, 1, 1],
            netmask: [255, 255, 255, 0],
        };
        assert_eq!(NetworkRecord::from_bytes(&rec.to_bytes()).unwrap(), rec);
    }

    #[test]
    fn calibration_record_roundtrip() {
        let rec = CalibrationRecord {
            install_height_mm: 2400,
            tilt_centideg: -150,
            x_offset_mm: 10,
            y_offset_mm: -25,
        };
        assert_eq!(CalibrationRecord::from_bytes(&rec.to_bytes()).unwrap(), rec);
    }

    #[test]
    fn wrong_length_rejected() {
        let err = DeviceRecord::from_bytes(&[0u8; 10]).unwrap_err();
        assert!(matches!(err, RecordError::Length { .. }));
    }
}
