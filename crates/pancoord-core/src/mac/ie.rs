//! Zero-copy readers for payload information elements
//!
//! Asynchronous Wi-SUN frames carry their schedule and network name as sub-IEs
//! nested in the WP-IE payload group. The readers here walk the raw bytes
//! without allocating; a truncated element ends iteration instead of failing.

/// Payload IE group carrying Wi-SUN sub-IEs
pub const PAYLOAD_GROUP_WISUN: u8 = 0x04;

/// Terminates the payload IE list
pub const PAYLOAD_GROUP_TERMINATION: u8 = 0x0F;

/// Unicast schedule sub-IE
pub const WISUN_SUB_IE_US: u8 = 0x01;

/// Network name sub-IE
pub const WISUN_SUB_IE_NET_NAME: u8 = 0x05;

// ----------------------------------------------------------------------------
// Payload Group IEs
// ----------------------------------------------------------------------------

/// One payload IE: a group id and its content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadIe<'a> {
    pub group_id: u8,
    pub content: &'a [u8],
}

impl<'a> PayloadIe<'a> {
    /// Nested sub-IEs of this group
    pub fn sub_ies(&self) -> SubIes<'a> {
        SubIes::new(self.content)
    }
}

/// Iterator over the payload IEs of a frame
#[derive(Debug, Clone)]
pub struct PayloadIes<'a> {
    data: &'a [u8],
}

impl<'a> PayloadIes<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }
}

impl<'a> Iterator for PayloadIes<'a> {
    type Item = PayloadIe<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.data.len() < 2 {
            return None;
        }
        let descriptor = u16::from_le_bytes([self.data[0], self.data[1]]);
        let len = (descriptor & 0x07FF) as usize;
        let group_id = ((descriptor >> 11) & 0x0F) as u8;
        if group_id == PAYLOAD_GROUP_TERMINATION {
            self.data = &[];
            return None;
        }
        let end = 2 + len;
        if self.data.len() < end {
            self.data = &[];
            return None;
        }
        let content = &self.data[2..end];
        self.data = &self.data[end..];
        Some(PayloadIe { group_id, content })
    }
}

// ----------------------------------------------------------------------------
// Nested Sub-IEs
// ----------------------------------------------------------------------------

/// One nested sub-IE
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubIe<'a> {
    pub sub_id: u8,
    /// Long format sub-IE
    pub long: bool,
    pub content: &'a [u8],
}

/// Iterator over the nested sub-IEs of a payload group
#[derive(Debug, Clone)]
pub struct SubIes<'a> {
    data: &'a [u8],
}

impl<'a> SubIes<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }
}

impl<'a> Iterator for SubIes<'a> {
    type Item = SubIe<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.data.len() < 2 {
            return None;
        }
        let descriptor = u16::from_le_bytes([self.data[0], self.data[1]]);
        let long = descriptor & 0x8000 != 0;
        let (len, sub_id) = if long {
            ((descriptor & 0x07FF) as usize, ((descriptor >> 11) & 0x0F) as u8)
        } else {
            ((descriptor & 0x00FF) as usize, ((descriptor >> 8) & 0x7F) as u8)
        };
        let end = 2 + len;
        if self.data.len() < end {
            self.data = &[];
            return None;
        }
        let content = &self.data[2..end];
        self.data = &self.data[end..];
        Some(SubIe {
            sub_id,
            long,
            content,
        })
    }
}

// ----------------------------------------------------------------------------
// Wi-SUN Elements
// ----------------------------------------------------------------------------

/// The Wi-SUN sub-IEs the coordinator acts on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WisunIes<'a> {
    pub net_name: Option<&'a [u8]>,
    pub unicast_schedule: Option<&'a [u8]>,
}

impl<'a> WisunIes<'a> {
    /// Collect the first network name and unicast schedule of a payload
    pub fn parse(payload: &'a [u8]) -> Self {
        let mut found = WisunIes::default();
        for group in PayloadIes::new(payload) {
            if group.group_id != PAYLOAD_GROUP_WISUN {
                continue;
            }
            for sub in group.sub_ies() {
                match sub.sub_id {
                    WISUN_SUB_IE_NET_NAME if found.net_name.is_none() => {
                        found.net_name = Some(sub.content);
                    }
                    WISUN_SUB_IE_US if found.unicast_schedule.is_none() => {
                        found.unicast_schedule = Some(sub.content);
                    }
                    _ => {}
                }
            }
        }
        found
    }
}

// ----------------------------------------------------------------------------
// Unicast Schedule
// ----------------------------------------------------------------------------

const US_CHANNEL_INFO_OFFSET: usize = 3;
const US_FIXED_CHANNEL_OFFSET_PLAN0: usize = 6;
const US_FIXED_CHANNEL_OFFSET_EXPLICIT: usize = 10;

/// How a neighbor advertises it listens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeighborSchedule {
    /// Single fixed channel
    Fixed(u16),
    Hopping,
}

impl NeighborSchedule {
    /// Decode the channel function of a unicast schedule IE
    pub fn from_unicast_schedule(content: &[u8]) -> Option<Self> {
        let channel_info = *content.get(US_CHANNEL_INFO_OFFSET)?;
        let channel_plan = channel_info & 0x07;
        let channel_function = (channel_info >> 3) & 0x07;
        if channel_function != 0 {
            return Some(NeighborSchedule::Hopping);
        }
        let offset = if channel_plan == 0 {
            US_FIXED_CHANNEL_OFFSET_PLAN0
        } else {
            US_FIXED_CHANNEL_OFFSET_EXPLICIT
        };
        let bytes = content.get(offset..offset + 2)?;
        Some(NeighborSchedule::Fixed(u16::from_le_bytes([
            bytes[0], bytes[1],
        ])))
    }
}

/// Encode a short-format sub-IE
pub fn encode_sub_ie(sub_id: u8, content: &[u8], out: &mut alloc::vec::Vec<u8>) {
    let descriptor = ((sub_id as u16 & 0x7F) << 8) | (content.len() as u16 & 0xFF);
    out.extend_from_slice(&descriptor.to_le_bytes());
    out.extend_from_slice(content);
}

/// Wrap sub-IEs into a Wi-SUN payload group
pub fn encode_wisun_group(sub_ies: &[u8]) -> alloc::vec::Vec<u8> {
    let descriptor: u16 =
        0x8000 | ((PAYLOAD_GROUP_WISUN as u16) << 11) | (sub_ies.len() as u16 & 0x07FF);
    let mut out = alloc::vec::Vec::with_capacity(sub_ies.len() + 2);
    out.extend_from_slice(&descriptor.to_le_bytes());
    out.extend_from_slice(sub_ies);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    fn fixed_schedule(plan: u8, channel: u16) -> Vec<u8> {
        let mut content = vec![0u8; 12];
        content[3] = plan & 0x07;
        let offset = if plan == 0 { 6 } else { 10 };
        content[offset..offset + 2].copy_from_slice(&channel.to_le_bytes());
        content
    }

    #[test]
    fn parses_net_name_and_schedule() {
        let mut subs = Vec::new();
        encode_sub_ie(WISUN_SUB_IE_US, &fixed_schedule(0, 17), &mut subs);
        encode_sub_ie(WISUN_SUB_IE_NET_NAME, b"mesh", &mut subs);
        let payload = encode_wisun_group(&subs);

        let ies = WisunIes::parse(&payload);
        assert_eq!(ies.net_name, Some(&b"mesh"[..]));
        let schedule = ies.unicast_schedule.and_then(NeighborSchedule::from_unicast_schedule);
        assert_eq!(schedule, Some(NeighborSchedule::Fixed(17)));
    }

    #[test]
    fn explicit_plan_reads_later_offset() {
        let content = fixed_schedule(1, 40);
        assert_eq!(
            NeighborSchedule::from_unicast_schedule(&content),
            Some(NeighborSchedule::Fixed(40))
        );
    }

    #[test]
    fn hopping_function_detected() {
        let mut content = vec![0u8; 8];
        content[3] = 2 << 3;
        assert_eq!(
            NeighborSchedule::from_unicast_schedule(&content),
            Some(NeighborSchedule::Hopping)
        );
    }

    #[test]
    fn truncated_elements_stop_iteration() {
        let mut subs = Vec::new();
        encode_sub_ie(WISUN_SUB_IE_NET_NAME, b"abc", &mut subs);
        let mut payload = encode_wisun_group(&subs);
        payload.truncate(payload.len() - 1);
        assert_eq!(WisunIes::parse(&payload), WisunIes::default());

        assert_eq!(NeighborSchedule::from_unicast_schedule(&[0, 0]), None);
    }

    #[test]
    fn other_groups_ignored() {
        let mut subs = Vec::new();
        encode_sub_ie(WISUN_SUB_IE_NET_NAME, b"x", &mut subs);
        let mut payload = Vec::new();
        let descriptor: u16 = 0x8000 | (0x01 << 11) | subs.len() as u16;
        payload.extend_from_slice(&descriptor.to_le_bytes());
        payload.extend_from_slice(&subs);
        assert_eq!(WisunIes::parse(&payload).net_name, None);
    }
}
