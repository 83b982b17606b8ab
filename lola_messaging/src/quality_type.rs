// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

use std::fmt;
use std::str::FromStr;

/// Safety-relevant quality class a registration, notification, or send
/// belongs to. Determines which of the handler's two independently-locked
/// registries and worker pools a call is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum QualityType {
    Invalid = 0x00,
    AsilQm = 0x01,
    AsilB = 0x02,
}

impl QualityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Invalid => "kInvalid",
            Self::AsilQm => "kASIL_QM",
            Self::AsilB => "kASIL_B",
        }
    }
}

impl fmt::Display for QualityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = match self {
            Self::Invalid => "Invalid",
            Self::AsilQm => "QM",
            Self::AsilB => "B",
        };
        f.write_str(short)
    }
}

impl FromStr for QualityType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "kInvalid" => Ok(Self::Invalid),
            "kASIL_QM" => Ok(Self::AsilQm),
            "kASIL_B" => Ok(Self::AsilB),
            _ => Err(()),
        }
    }
}

/// Whether two quality classes may interoperate directly. Currently this
/// subsystem never mixes levels: an ASIL-B registration only ever talks to
/// another ASIL-B registration.
pub fn are_compatible(lhs: QualityType, rhs: QualityType) -> bool {
    lhs == rhs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_string() {
        for q in [QualityType::Invalid, QualityType::AsilQm, QualityType::AsilB] {
            assert_eq!(QualityType::from_str(q.as_str()), Ok(q));
        }
    }

    #[test]
    fn compatibility_requires_exact_match() {
        assert!(are_compatible(QualityType::AsilQm, QualityType::AsilQm));
        assert!(!are_compatible(QualityType::AsilQm, QualityType::AsilB));
    }
}
