//! Record identifier type.

use std::fmt;

use super::config::RID_SIZE;

/// Points at a record stored elsewhere (page number + slot number).
///
/// The index never interprets a RID beyond equality.
///
/// # Example
/// ```
/// use ixdb::Rid;
///
/// let rid = Rid::new(3, 7);
/// assert_eq!(rid.page_num, 3);
/// assert_eq!(rid.slot_num, 7);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Rid {
    pub page_num: u32,
    pub slot_num: u32,
}

impl Rid {
    #[inline]
    pub fn new(page_num: u32, slot_num: u32) -> Self {
        Self { page_num, slot_num }
    }

    /// Decode a RID from its 8-byte on-page form.
    ///
    /// # Panics
    /// Panics if `bytes.len() < RID_SIZE`.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        assert!(bytes.len() >= RID_SIZE, "buffer too small for Rid");
        Self {
            page_num: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            slot_num: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        }
    }

    /// Encode this RID into its 8-byte on-page form.
    pub fn to_bytes(self) -> [u8; RID_SIZE] {
        let mut bytes = [0u8; RID_SIZE];
        bytes[0..4].copy_from_slice(&self.page_num.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.slot_num.to_le_bytes());
        bytes
    }
}

impl fmt::Display for Rid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.page_num, self.slot_num)
    }
}
