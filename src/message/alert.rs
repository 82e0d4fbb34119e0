use nom::number::complete::be_u8;
use nom::IResult;

use crate::buffer::Buf;
use crate::types::{AlertDescription, AlertLevel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alert {
    pub level: AlertLevel,
    pub description: AlertDescription,
}

impl Alert {
    pub fn new(level: AlertLevel, description: AlertDescription) -> Self {
        Alert { level, description }
    }

    pub fn fatal(description: AlertDescription) -> Self {
        Alert::new(AlertLevel::Fatal, description)
    }

    pub fn warning(description: AlertDescription) -> Self {
        Alert::new(AlertLevel::Warning, description)
    }

    /// close_notify is sent as a warning but ends the connection, like any
    /// fatal alert.
    pub fn is_fatal(&self) -> bool {
        self.level != AlertLevel::Warning
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], Alert> {
        let (input, level) = be_u8(input)?;
        let (input, description) = be_u8(input)?;
        Ok((
            input,
            Alert {
                level: AlertLevel::from_u8(level),
                description: AlertDescription::from_u8(description),
            },
        ))
    }

    pub fn serialize(&self, output: &mut Buf) {
        output.push(self.level.as_u8());
        output.push(self.description.as_u8());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MESSAGE: &[u8] = &[
        0x02, // AlertLevel::Fatal
        0x14, // AlertDescription::BadRecordMac
    ];

    #[test]
    fn roundtrip() {
        let (rest, alert) = Alert::parse(MESSAGE).unwrap();
        assert!(rest.is_empty());
        assert_eq!(alert, Alert::fatal(AlertDescription::BadRecordMac));
        assert!(alert.is_fatal());

        let mut out = Buf::new();
        alert.serialize(&mut out);
        assert_eq!(&out[..], MESSAGE);
    }

    #[test]
    fn unknown_level_is_fatal() {
        let (_, alert) = Alert::parse(&[0x07, 0x00]).unwrap();
        assert!(alert.is_fatal());
        assert_eq!(alert.description, AlertDescription::CloseNotify);
    }
}
