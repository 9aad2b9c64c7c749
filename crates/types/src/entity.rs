// This file is part of Opguard.
//
// Opguard is free software: you can redistribute it and/or modify it under the
// terms of the GNU Lesser General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version.
//
// Opguard is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with Opguard.
// If not, see https://www.gnu.org/licenses/.

use parse_display::Display;
use serde::{Deserialize, Serialize};
use strum::EnumIter;

/// Kind of participant whose code runs during the validation phase of a user
/// operation.
#[derive(Display, Debug, Clone, Copy, Eq, PartialEq, Hash, EnumIter, Serialize, Deserialize)]
#[display(style = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    /// The sender smart account running `validateUserOp`.
    Account,
    /// The contract deploying the account when `initCode` is present.
    Factory,
    /// The sponsoring contract running `validatePaymasterUserOp`.
    Paymaster,
    /// Reserved for callers that drive the EVM outside the phased flow; the
    /// entry point itself is exempt from entity rules.
    EntryPoint,
}
