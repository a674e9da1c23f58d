//! Generic netlink controller: family and multicast group resolution.

use crate::codec::{Attribute, GenlMessage};
use crate::error::{FrameError, Result};

/// Fixed family id of the controller.
pub const GENL_ID_CTRL: u16 = 0x10;
pub const CTRL_VERSION: u8 = 1;

pub const CTRL_CMD_NEWFAMILY: u8 = 1;
pub const CTRL_CMD_GETFAMILY: u8 = 3;

pub const CTRL_ATTR_FAMILY_ID: u16 = 1;
pub const CTRL_ATTR_FAMILY_NAME: u16 = 2;
pub const CTRL_ATTR_VERSION: u16 = 3;
pub const CTRL_ATTR_MCAST_GROUPS: u16 = 7;

pub const CTRL_ATTR_MCAST_GRP_NAME: u16 = 1;
pub const CTRL_ATTR_MCAST_GRP_ID: u16 = 2;

/// A multicast group advertised by a family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct McastGroup {
    pub name: String,
    pub id: u32,
}

/// A resolved generic netlink family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyInfo {
    pub id: u16,
    pub name: String,
    pub version: u32,
    pub groups: Vec<McastGroup>,
}

impl FamilyInfo {
    pub fn group(&self, name: &str) -> Option<&McastGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// Parse a `CTRL_CMD_NEWFAMILY` reply.
    pub fn from_message(msg: &GenlMessage) -> Result<Self> {
        if msg.family != GENL_ID_CTRL {
            return Err(FrameError::Malformed("not a controller message"));
        }
        let id = msg
            .attr(CTRL_ATTR_FAMILY_ID)
            .ok_or(FrameError::Malformed("family reply without id"))?
            .as_u16()?;
        let name = msg
            .attr(CTRL_ATTR_FAMILY_NAME)
            .ok_or(FrameError::Malformed("family reply without name"))?
            .as_str()?
            .to_owned();
        let version = msg
            .attr(CTRL_ATTR_VERSION)
            .map(Attribute::as_u32)
            .transpose()?
            .unwrap_or(0);

        let mut groups = Vec::new();
        if let Some(list) = msg.attr(CTRL_ATTR_MCAST_GROUPS) {
            for entry in list.children()? {
                let fields = entry.children()?;
                let field = |kind| fields.iter().find(|a| a.kind() == kind);
                let name = field(CTRL_ATTR_MCAST_GRP_NAME)
                    .ok_or(FrameError::Malformed("multicast group without name"))?
                    .as_str()?
                    .to_owned();
                let id = field(CTRL_ATTR_MCAST_GRP_ID)
                    .ok_or(FrameError::Malformed("multicast group without id"))?
                    .as_u32()?;
                groups.push(McastGroup { name, id });
            }
        }

        Ok(Self {
            id,
            name,
            version,
            groups,
        })
    }

    /// Build the controller reply describing this family.
    pub fn to_message(&self, seq: u32) -> Result<GenlMessage> {
        let entries = self
            .groups
            .iter()
            .enumerate()
            .map(|(i, g)| {
                Attribute::nested(
                    (i + 1) as u16,
                    &[
                        Attribute::string(CTRL_ATTR_MCAST_GRP_NAME, &g.name),
                        Attribute::u32(CTRL_ATTR_MCAST_GRP_ID, g.id),
                    ],
                )
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(
            GenlMessage::new(GENL_ID_CTRL, CTRL_CMD_NEWFAMILY, CTRL_VERSION)
                .with_seq(seq)
                .with_attr(Attribute::u16(CTRL_ATTR_FAMILY_ID, self.id))
                .with_attr(Attribute::string(CTRL_ATTR_FAMILY_NAME, &self.name))
                .with_attr(Attribute::u32(CTRL_ATTR_VERSION, self.version))
                .with_attr(Attribute::nested(CTRL_ATTR_MCAST_GROUPS, &entries)?),
        )
    }
}

/// Ask the controller to describe the family called `name`.
pub fn get_family_request(name: &str, seq: u32) -> GenlMessage {
    GenlMessage::request(GENL_ID_CTRL, CTRL_CMD_GETFAMILY, CTRL_VERSION)
        .with_seq(seq)
        .with_attr(Attribute::string(CTRL_ATTR_FAMILY_NAME, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_message, Frame, DEFAULT_MAX_FRAME};

    fn wimax_family() -> FamilyInfo {
        FamilyInfo {
            id: 0x1b,
            name: "WiMAX".into(),
            version: 1,
            groups: vec![
                McastGroup {
                    name: "msg".into(),
                    id: 3,
                },
                McastGroup {
                    name: "diag".into(),
                    id: 4,
                },
            ],
        }
    }

    #[test]
    fn test_family_reply_roundtrip() {
        let family = wimax_family();
        let wire = family.to_message(11).unwrap().encode(DEFAULT_MAX_FRAME).unwrap();
        let Frame::Genl(msg) = decode_message(&wire).unwrap() else {
            panic!("expected genl frame");
        };
        assert_eq!(msg.seq, 11);
        let parsed = FamilyInfo::from_message(&msg).unwrap();
        assert_eq!(parsed, family);
        assert_eq!(parsed.group("diag").unwrap().id, 4);
        assert!(parsed.group("trace").is_none());
    }

    #[test]
    fn test_reply_without_groups() {
        let msg = GenlMessage::new(GENL_ID_CTRL, CTRL_CMD_NEWFAMILY, 1)
            .with_attr(Attribute::u16(CTRL_ATTR_FAMILY_ID, 0x21))
            .with_attr(Attribute::string(CTRL_ATTR_FAMILY_NAME, "WiMAX"));
        let family = FamilyInfo::from_message(&msg).unwrap();
        assert_eq!(family.id, 0x21);
        assert_eq!(family.version, 0);
        assert!(family.groups.is_empty());
    }

    #[test]
    fn test_reply_without_id_is_malformed() {
        let msg = GenlMessage::new(GENL_ID_CTRL, CTRL_CMD_NEWFAMILY, 1)
            .with_attr(Attribute::string(CTRL_ATTR_FAMILY_NAME, "WiMAX"));
        assert!(matches!(
            FamilyInfo::from_message(&msg),
            Err(FrameError::Malformed(_))
        ));
    }

    #[test]
    fn test_get_family_request() {
        let req = get_family_request("WiMAX", 1);
        assert_eq!(req.family, GENL_ID_CTRL);
        assert_eq!(req.cmd, CTRL_CMD_GETFAMILY);
        assert_eq!(
            req.attr(CTRL_ATTR_FAMILY_NAME).unwrap().as_str().unwrap(),
            "WiMAX"
        );
    }
}
