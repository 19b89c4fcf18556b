//! USB control request setup packets.

use serde::{Deserialize, Serialize};

/// `bmRequestType` bit set for device-to-host (IN) requests.
pub const DIR_IN: u8 = 0x80;

const TYPE_MASK: u8 = 0x60;
const RECIPIENT_MASK: u8 = 0x1f;

/// The 8-byte setup stage of a control transfer, with its multi-byte fields already
/// converted from little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SetupPacket {
    #[serde(rename = "bmRequestType")]
    pub bm_request_type: u8,
    #[serde(rename = "bRequest")]
    pub b_request: u8,
    #[serde(rename = "wValue")]
    pub w_value: u16,
    #[serde(rename = "wIndex")]
    pub w_index: u16,
    #[serde(rename = "wLength")]
    pub w_length: u16,
}

/// Bits 5..6 of `bmRequestType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestType {
    Standard,
    Class,
    Vendor,
    Reserved,
}

/// Bits 0..4 of `bmRequestType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Recipient {
    Device,
    Interface,
    Endpoint,
    Other,
    Reserved(u8),
}

impl SetupPacket {
    /// Size of a setup packet on the wire.
    pub const SIZE: usize = 8;

    /// Decodes a setup packet from its wire representation.
    #[inline(always)]
    pub const fn from_bytes(bytes: [u8; Self::SIZE]) -> Self {
        Self {
            bm_request_type: bytes[0],
            b_request: bytes[1],
            w_value: u16::from_le_bytes([bytes[2], bytes[3]]),
            w_index: u16::from_le_bytes([bytes[4], bytes[5]]),
            w_length: u16::from_le_bytes([bytes[6], bytes[7]]),
        }
    }

    /// Encodes this setup packet into its wire representation.
    #[inline(always)]
    pub const fn to_bytes(self) -> [u8; Self::SIZE] {
        let [v0, v1] = self.w_value.to_le_bytes();
        let [i0, i1] = self.w_index.to_le_bytes();
        let [l0, l1] = self.w_length.to_le_bytes();
        [self.bm_request_type, self.b_request, v0, v1, i0, i1, l0, l1]
    }

    #[inline(always)]
    pub const fn is_device_to_host(self) -> bool {
        (self.bm_request_type & DIR_IN) != 0
    }

    #[inline(always)]
    pub const fn request_type(self) -> RequestType {
        match (self.bm_request_type & TYPE_MASK) >> 5 {
            0 => RequestType::Standard,
            1 => RequestType::Class,
            2 => RequestType::Vendor,
            _ => RequestType::Reserved,
        }
    }

    #[inline(always)]
    pub const fn recipient(self) -> Recipient {
        match self.bm_request_type & RECIPIENT_MASK {
            0 => Recipient::Device,
            1 => Recipient::Interface,
            2 => Recipient::Endpoint,
            3 => Recipient::Other,
            r => Recipient::Reserved(r),
        }
    }

    /// Interface number addressed by an interface-recipient request (low byte of `wIndex`).
    #[inline(always)]
    pub const fn interface(self) -> u8 {
        self.w_index.to_le_bytes()[0]
    }

    /// Entity (unit, terminal or clock) addressed by an audio class request
    /// (high byte of `wIndex`).
    #[inline(always)]
    pub const fn entity_id(self) -> u8 {
        self.w_index.to_le_bytes()[1]
    }

    /// Control selector of an audio class request (high byte of `wValue`).
    #[inline(always)]
    pub const fn control_selector(self) -> u8 {
        self.w_value.to_le_bytes()[1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_class_interface_get_cur() {
        // GET CUR, sampling frequency control of clock 10 on interface 0, 4 bytes
        let setup = SetupPacket::from_bytes([0xa1, 0x01, 0x00, 0x01, 0x00, 0x0a, 0x04, 0x00]);

        assert!(setup.is_device_to_host());
        assert_eq!(setup.request_type(), RequestType::Class);
        assert_eq!(setup.recipient(), Recipient::Interface);
        assert_eq!(setup.interface(), 0);
        assert_eq!(setup.entity_id(), 10);
        assert_eq!(setup.control_selector(), 1);
        assert_eq!(setup.w_length, 4);
        assert_eq!(SetupPacket::from_bytes(setup.to_bytes()), setup);
    }

    #[test]
    fn standard_endpoint_request() {
        let setup = SetupPacket::from_bytes([0x02, 0x01, 0, 0, 0x81, 0, 0, 0]);

        assert!(!setup.is_device_to_host());
        assert_eq!(setup.request_type(), RequestType::Standard);
        assert_eq!(setup.recipient(), Recipient::Endpoint);
    }
}
