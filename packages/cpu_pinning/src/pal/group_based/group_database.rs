use crate::error::native_status;
use crate::pal::group_based::{ERROR_INSUFFICIENT_BUFFER, GroupBindings};
use crate::{Error, Result};

// Layout of a SYSTEM_LOGICAL_PROCESSOR_INFORMATION_EX record for RelationGroup:
//
// u32 Relationship, u32 Size, then GROUP_RELATIONSHIP:
//   u16 MaximumGroupCount, u16 ActiveGroupCount, u8 Reserved[20],
//   PROCESSOR_GROUP_INFO GroupInfo[ActiveGroupCount]:
//     u8 MaximumProcessorCount, u8 ActiveProcessorCount, u8 Reserved[38], KAFFINITY Mask
const RELATION_GROUP: u32 = 4;
const RECORD_SIZE_OFFSET: usize = 4;
const RECORD_HEADER_SIZE: usize = 8;
const ACTIVE_GROUP_COUNT_OFFSET: usize = 2;
const GROUP_RELATIONSHIP_HEADER_SIZE: usize = 24;
const GROUP_INFO_ACTIVE_COUNT_OFFSET: usize = 1;
const GROUP_INFO_MASK_OFFSET: usize = 40;
const GROUP_INFO_SIZE: usize = GROUP_INFO_MASK_OFFSET + size_of::<usize>();

// Windows never puts more processors than this into one group.
const MAXIMUM_PROCESSORS_PER_GROUP: u8 = 64;

// The decoder works on raw bytes so it can be exercised on every platform. Where the native
// structures exist, the offsets above must agree with them.
#[cfg(windows)]
mod native_layout {
    use std::mem::offset_of;

    use static_assertions::const_assert_eq;
    use windows::Win32::System::SystemInformation::{
        GROUP_RELATIONSHIP, PROCESSOR_GROUP_INFO, RelationGroup,
        SYSTEM_LOGICAL_PROCESSOR_INFORMATION_EX,
    };

    use super::{
        ACTIVE_GROUP_COUNT_OFFSET, GROUP_INFO_ACTIVE_COUNT_OFFSET, GROUP_INFO_MASK_OFFSET,
        GROUP_INFO_SIZE, GROUP_RELATIONSHIP_HEADER_SIZE, RECORD_HEADER_SIZE, RECORD_SIZE_OFFSET,
        RELATION_GROUP,
    };

    const_assert_eq!(RelationGroup.0.unsigned_abs(), RELATION_GROUP);
    const_assert_eq!(
        offset_of!(SYSTEM_LOGICAL_PROCESSOR_INFORMATION_EX, Size),
        RECORD_SIZE_OFFSET
    );
    const_assert_eq!(
        offset_of!(SYSTEM_LOGICAL_PROCESSOR_INFORMATION_EX, Anonymous),
        RECORD_HEADER_SIZE
    );
    const_assert_eq!(
        offset_of!(GROUP_RELATIONSHIP, ActiveGroupCount),
        ACTIVE_GROUP_COUNT_OFFSET
    );
    const_assert_eq!(
        offset_of!(GROUP_RELATIONSHIP, GroupInfo),
        GROUP_RELATIONSHIP_HEADER_SIZE
    );
    const_assert_eq!(
        offset_of!(PROCESSOR_GROUP_INFO, ActiveProcessorCount),
        GROUP_INFO_ACTIVE_COUNT_OFFSET
    );
    const_assert_eq!(
        offset_of!(PROCESSOR_GROUP_INFO, ActiveProcessorMask),
        GROUP_INFO_MASK_OFFSET
    );
    const_assert_eq!(size_of::<PROCESSOR_GROUP_INFO>(), GROUP_INFO_SIZE);
}

/// One processor group as reported by the operating system.
///
/// Used with [`encode_group_topology()`] to describe a synthetic topology for custom
/// [`GroupBindings`] implementations.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ProcessorGroup {
    /// Number of processors of the group that are present and usable.
    pub(crate) active_processor_count: u8,

    /// Which in-group positions hold an active processor.
    pub(crate) active_processor_mask: usize,
}

impl ProcessorGroup {
    /// Describes a group with `active_processor_count` processors at the in-group positions
    /// selected by `active_processor_mask`.
    #[must_use]
    pub const fn new(active_processor_count: u8, active_processor_mask: usize) -> Self {
        Self {
            active_processor_count,
            active_processor_mask,
        }
    }
}

/// Snapshot of the processor groups of the system, taken once and never modified.
#[derive(Debug)]
pub(crate) struct GroupDatabase {
    groups: Vec<ProcessorGroup>,
}

impl GroupDatabase {
    /// Queries the group topology: probe for the required size, allocate, fill.
    pub(crate) fn query(bindings: &impl GroupBindings) -> Result<Self> {
        let mut required_length = 0;

        match bindings.get_logical_processor_group_information(&mut [], &mut required_length) {
            Err(e) if e.raw_os_error() == Some(ERROR_INSUFFICIENT_BUFFER) => {}
            Err(e) => {
                return Err(Error::TopologyQuery {
                    stage: "probe",
                    status: native_status(&e),
                    source: Some(e),
                });
            }
            Ok(()) => {
                // An empty buffer can never hold the topology.
                return Err(Error::TopologyQuery {
                    stage: "probe",
                    status: 0,
                    source: None,
                });
            }
        }

        let mut buffer = vec![0; required_length as usize];
        let mut returned_length = required_length;

        bindings
            .get_logical_processor_group_information(&mut buffer, &mut returned_length)
            .map_err(|e| Error::TopologyQuery {
                stage: "fill",
                status: native_status(&e),
                source: Some(e),
            })?;

        buffer.truncate(returned_length as usize);

        Self::decode(&buffer)
    }

    pub(crate) fn groups(&self) -> &[ProcessorGroup] {
        &self.groups
    }

    /// Total number of active processors across all groups.
    pub(crate) fn processor_count(&self) -> u32 {
        self.groups
            .iter()
            .map(|g| u32::from(g.active_processor_count))
            .sum()
    }

    fn decode(buffer: &[u8]) -> Result<Self> {
        let mut offset = 0_usize;

        while let Some(header) = buffer.get(offset..offset.saturating_add(RECORD_HEADER_SIZE)) {
            let relationship = read_u32(header, 0)?;
            let size = read_u32(header, RECORD_SIZE_OFFSET)? as usize;

            if size < RECORD_HEADER_SIZE {
                return Err(malformed(format!("record at offset {offset} has size {size}")));
            }

            let record = buffer
                .get(offset..offset.saturating_add(size))
                .ok_or_else(|| malformed(format!("record at offset {offset} is truncated")))?;

            if relationship == RELATION_GROUP {
                return Self::decode_group_record(record);
            }

            offset = offset.saturating_add(size);
        }

        Err(malformed("no processor group relationship found".to_string()))
    }

    fn decode_group_record(record: &[u8]) -> Result<Self> {
        let body = record.get(RECORD_HEADER_SIZE..).unwrap_or_default();
        let active_group_count = usize::from(read_u16(body, ACTIVE_GROUP_COUNT_OFFSET)?);

        let groups = (0..active_group_count)
            .map(|index| {
                let start = GROUP_RELATIONSHIP_HEADER_SIZE + index * GROUP_INFO_SIZE;

                let info = body.get(start..start + GROUP_INFO_SIZE).ok_or_else(|| {
                    malformed(format!("processor group {index} is truncated"))
                })?;

                Ok(ProcessorGroup {
                    active_processor_count: read_u8(info, GROUP_INFO_ACTIVE_COUNT_OFFSET)?,
                    active_processor_mask: read_usize(info, GROUP_INFO_MASK_OFFSET)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        if groups.is_empty() {
            return Err(malformed("no active processor groups".to_string()));
        }

        Ok(Self { groups })
    }
}

fn malformed(problem: String) -> Error {
    Error::MalformedTopology { problem }
}

fn read_bytes<const N: usize>(buffer: &[u8], offset: usize) -> Result<[u8; N]> {
    buffer
        .get(offset..offset + N)
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or_else(|| malformed(format!("field at offset {offset} is truncated")))
}

fn read_u8(buffer: &[u8], offset: usize) -> Result<u8> {
    read_bytes::<1>(buffer, offset).map(u8::from_ne_bytes)
}

fn read_u16(buffer: &[u8], offset: usize) -> Result<u16> {
    read_bytes(buffer, offset).map(u16::from_ne_bytes)
}

fn read_u32(buffer: &[u8], offset: usize) -> Result<u32> {
    read_bytes(buffer, offset).map(u32::from_ne_bytes)
}

fn read_usize(buffer: &[u8], offset: usize) -> Result<usize> {
    read_bytes(buffer, offset).map(usize::from_ne_bytes)
}

/// Encodes processor groups as the single `RelationGroup` record that
/// `GetLogicalProcessorInformationEx()` returns.
///
/// Custom [`GroupBindings`] implementations can hand out the result from
/// [`get_logical_processor_group_information()`][GroupBindings::get_logical_processor_group_information]
/// to present a synthetic topology to [`GroupBackend`][crate::GroupBackend].
///
/// # Errors
///
/// Returns [`Error::MalformedTopology`] if there are more groups than the record can describe.
pub fn encode_group_topology(groups: &[ProcessorGroup]) -> Result<Vec<u8>> {
    let Ok(group_count) = u16::try_from(groups.len()) else {
        return Err(malformed(format!(
            "{} processor groups do not fit in one record",
            groups.len()
        )));
    };

    // Cannot overflow `u32` with at most `u16::MAX` groups.
    let size = RECORD_HEADER_SIZE + GROUP_RELATIONSHIP_HEADER_SIZE + groups.len() * GROUP_INFO_SIZE;
    let Ok(size_field) = u32::try_from(size) else {
        return Err(malformed(format!("record of {size} bytes is too large")));
    };

    let mut buffer = Vec::with_capacity(size);
    buffer.extend_from_slice(&RELATION_GROUP.to_ne_bytes());
    buffer.extend_from_slice(&size_field.to_ne_bytes());
    buffer.extend_from_slice(&group_count.to_ne_bytes());
    buffer.extend_from_slice(&group_count.to_ne_bytes());
    buffer.resize(RECORD_HEADER_SIZE + GROUP_RELATIONSHIP_HEADER_SIZE, 0);

    for group in groups {
        let start = buffer.len();
        buffer.push(MAXIMUM_PROCESSORS_PER_GROUP);
        buffer.push(group.active_processor_count);
        buffer.resize(start + GROUP_INFO_MASK_OFFSET, 0);
        buffer.extend_from_slice(&group.active_processor_mask.to_ne_bytes());
    }

    Ok(buffer)
}
