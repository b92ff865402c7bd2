//! AVC (H.264) decoder configuration record parsing and Annex-B conversion.
//!
//! `CodecPrivateData` for HSS video quality levels is Annex-B, not the
//! AVCC blob tracks are stored as. This is adapted from the teacher's
//! `DecoderConfigurationRecord` AVCC parser, extended with the
//! start-code re-serialization HSS needs.

use bytes::{Buf, Bytes};

#[derive(Debug)]
pub enum AvcError {
    NotEnoughData,
    UnsupportedConfigurationRecordVersion(u8),
}

/// A single SPS or PPS NAL unit, stored without its AVCC length prefix.
#[derive(Debug, Clone)]
pub struct NalUnit(pub Bytes);

/// AVC decoder configuration record (ISO/IEC 14496-15 5.2.4.1.1).
///
/// Bits | Name
/// ---- | ----
/// 8    | Version
/// 8    | Profile Indication
/// 8    | Profile Compatibility
/// 8    | Level Indication
/// 6    | Reserved
/// 2    | NALU Length
/// 3    | Reserved
/// 5    | SPS Count
/// 16   | SPS Length
/// var  | SPS
/// 8    | PPS Count
/// 16   | PPS Length
/// var  | PPS
#[derive(Debug, Clone)]
pub struct DecoderConfigurationRecord {
    pub version: u8,
    pub profile_indication: u8,
    pub profile_compatibility: u8,
    pub level_indication: u8,
    pub sps: Vec<NalUnit>,
    pub pps: Vec<NalUnit>,
}

impl DecoderConfigurationRecord {
    pub fn parse(init: &[u8]) -> Result<Self, AvcError> {
        let mut buf = Bytes::copy_from_slice(init);

        if buf.remaining() < 6 {
            return Err(AvcError::NotEnoughData);
        }

        let version = buf.get_u8();
        if version != 1 {
            return Err(AvcError::UnsupportedConfigurationRecordVersion(version));
        }

        let profile_indication = buf.get_u8();
        let profile_compatibility = buf.get_u8();
        let level_indication = buf.get_u8();
        let _nalu_size = (buf.get_u8() & 0x03) + 1;

        let sps_count = buf.get_u8() & 0x1f;
        let mut sps = Vec::with_capacity(sps_count as usize);
        for _ in 0..sps_count {
            sps.push(NalUnit(read_length_prefixed(&mut buf)?));
        }

        if buf.remaining() < 1 {
            return Err(AvcError::NotEnoughData);
        }

        let pps_count = buf.get_u8();
        let mut pps = Vec::with_capacity(pps_count as usize);
        for _ in 0..pps_count {
            pps.push(NalUnit(read_length_prefixed(&mut buf)?));
        }

        Ok(Self {
            version,
            profile_indication,
            profile_compatibility,
            level_indication,
            sps,
            pps,
        })
    }
}

fn read_length_prefixed(buf: &mut Bytes) -> Result<Bytes, AvcError> {
    if buf.remaining() < 2 {
        return Err(AvcError::NotEnoughData);
    }

    let len = buf.get_u16() as usize;

    if buf.remaining() < len {
        return Err(AvcError::NotEnoughData);
    }

    Ok(buf.split_to(len))
}

const ANNEX_B_START_CODE: &[u8] = &[0, 0, 0, 1];

/// Converts an AVCC decoder configuration record's parameter sets into
/// Annex-B: each NAL unit prefixed with a 4-byte start code, SPS units
/// first, then PPS units, in the order they appear in the record.
pub fn avcc_to_annex_b(init: &[u8]) -> Result<Vec<u8>, AvcError> {
    let dcr = DecoderConfigurationRecord::parse(init)?;

    let mut out = Vec::new();
    for nal in dcr.sps.iter().chain(dcr.pps.iter()) {
        out.extend_from_slice(ANNEX_B_START_CODE);
        out.extend_from_slice(&nal.0);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_avcc() -> Vec<u8> {
        vec![
            0x01, 0x64, 0x00, 0x16, 0xff, // version, profile, compat, level, nalu_size|reserved
            0xe1, // reserved(3) | sps_count(5) = 1
            0x00, 0x04, 0xaa, 0xbb, 0xcc, 0xdd, // sps length 4, sps bytes
            0x01, // pps_count = 1
            0x00, 0x03, 0x11, 0x22, 0x33, // pps length 3, pps bytes
        ]
    }

    #[test]
    fn parses_version_and_counts() {
        let dcr = DecoderConfigurationRecord::parse(&sample_avcc()).unwrap();
        assert_eq!(dcr.version, 1);
        assert_eq!(dcr.sps.len(), 1);
        assert_eq!(dcr.pps.len(), 1);
    }

    #[test]
    fn annex_b_prefixes_each_nal_with_a_start_code() {
        let annex_b = avcc_to_annex_b(&sample_avcc()).unwrap();
        assert_eq!(
            annex_b,
            vec![
                0, 0, 0, 1, 0xaa, 0xbb, 0xcc, 0xdd, // sps
                0, 0, 0, 1, 0x11, 0x22, 0x33, // pps
            ]
        );
    }

    #[test]
    fn rejects_unsupported_version() {
        let mut avcc = sample_avcc();
        avcc[0] = 2;
        assert!(matches!(
            DecoderConfigurationRecord::parse(&avcc),
            Err(AvcError::UnsupportedConfigurationRecordVersion(2))
        ));
    }
}
