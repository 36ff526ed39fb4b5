/*
 *  Copyright (C) 2025  Markus Elias Gerber
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  You should have received a copy of the GNU General Public License
 *  along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use static_assertions::const_assert;

/// Size of one machine page in bytes.
///
/// Every frame of physical memory, every swap slot and every lazily loaded
/// executable page is exactly this big.
pub const PAGE_SIZE: usize = 1024;

const_assert!(PAGE_SIZE.is_power_of_two());

/// Machine-wide tunables handed to [`crate::VmKernel::new`].
#[derive(Debug, Clone)]
pub struct VmConfig {
    /// Number of physical frames backing all processes together.
    pub phys_pages: usize,

    /// Number of slots in the software managed TLB.
    pub tlb_size: usize,

    /// Seed for the kernel RNG that drives victim selection and TLB slot
    /// replacement. Fix it to make an entire run reproducible.
    pub rng_seed: u64,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            phys_pages: 64,
            tlb_size: 4,
            rng_seed: 0x7061_6765_766d,
        }
    }
}
