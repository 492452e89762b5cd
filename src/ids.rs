// Copyright 2017 Matthew Plant. This file is part of iris-collision.
//
// iris-collision is free software: you can redistribute it and/or modify
// it under the terms of the GNU Lesser General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// iris-collision is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public License
// along with iris-collision. If not, see <http://www.gnu.org/licenses/>.

use std::fmt;

use serde::{Deserialize, Serialize};

const INVALID_ID: u64 = u64::MAX;

macro_rules! impl_identifier {
    (
        $name:ident, $label:expr
    ) => {
        impl $name {
            /// Creates an identifier with the given raw value.
            pub const fn new(value: u64) -> Self {
                $name(value)
            }

            /// Returns the raw value of the identifier.
            pub const fn value(&self) -> u64 {
                self.0
            }

            /// Returns false for the default-constructed identifier.
            pub const fn is_valid(&self) -> bool {
                self.0 != INVALID_ID
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name(INVALID_ID)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                if self.is_valid() {
                    write!(f, "{}({})", $label, self.0)
                } else {
                    write!(f, "{}(invalid)", $label)
                }
            }
        }
    };
}

/// Identifies a rigid body frame whose world pose is a function of the
/// configuration.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FrameId(u64);

impl_identifier!(FrameId, "FrameId");

impl FrameId {
    /// The world frame. Its pose never depends on the configuration.
    pub const fn world() -> Self {
        FrameId(0)
    }
}

/// Identifies a geometry registered with a scene.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GeometryId(u64);

impl_identifier!(GeometryId, "GeometryId");

#[cfg(test)]
mod tests {
    mod ids {
        use crate::ids::{FrameId, GeometryId};

        #[test]
        fn test_validity() {
            assert!(!FrameId::default().is_valid());
            assert!(FrameId::world().is_valid());
            assert!(FrameId::new(3).is_valid());
            assert!(!GeometryId::default().is_valid());
            assert_eq!(GeometryId::new(7).value(), 7);
        }

        #[test]
        fn test_display() {
            assert_eq!(format!("{}", FrameId::new(2)), "FrameId(2)");
            assert_eq!(format!("{}", GeometryId::default()), "GeometryId(invalid)");
        }
    }
}
