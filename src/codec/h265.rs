use super::after_start_code;

/// H.265 NAL unit types relevant to key-unit detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NALUnitType {
    IdrWRadl,
    IdrNLp,
    Cra,
    Vps,
    Sps,
    Pps,
    Other(u8),
}

impl From<u8> for NALUnitType {
    fn from(header: u8) -> Self {
        match (header >> 1) & 0x3f {
            19 => NALUnitType::IdrWRadl,
            20 => NALUnitType::IdrNLp,
            21 => NALUnitType::Cra,
            32 => NALUnitType::Vps,
            33 => NALUnitType::Sps,
            34 => NALUnitType::Pps,
            t => NALUnitType::Other(t),
        }
    }
}

pub fn first_nal_type(data: &[u8]) -> Option<NALUnitType> {
    let i = after_start_code(data)?;
    data.get(i).map(|&b| NALUnitType::from(b))
}

/// An H.265 access unit is a key unit when it leads with a VPS.
pub fn is_key_unit(data: &[u8]) -> bool {
    first_nal_type(data) == Some(NALUnitType::Vps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_unit() {
        // VPS header: type 32 -> 0x40 0x01
        assert!(is_key_unit(&[0, 0, 0, 1, 0x40, 0x01, 0x0c]));
        // SPS alone doesn't start a group here.
        assert!(!is_key_unit(&[0, 0, 0, 1, 0x42, 0x01]));
        assert_eq!(first_nal_type(&[0, 0, 1, 0x26, 0x01]), Some(NALUnitType::IdrWRadl));
        assert_eq!(first_nal_type(&[0, 0, 1, 0x02, 0x01]), Some(NALUnitType::Other(1)));
    }
}
