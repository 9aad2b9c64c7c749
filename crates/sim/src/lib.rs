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

//! Bundler-side admission checks for ERC-4337 user operations: structural
//! validation, pre-verification gas estimation, and simulation of the
//! validation phase through an embedded EVM with EIP-7562 rule enforcement.

pub mod eth;
pub mod gas;
pub mod precheck;
pub mod reputation;
pub mod simulation;

pub use simulation::{Settings, SimulationResult, Simulator, SimulatorImpl};
