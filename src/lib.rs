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

mod kernel;
mod machine;
mod page_table;
mod process_vm;
mod swap_store;
mod vm_config;

#[cfg(test)]
mod test;

pub use crate::kernel::VmKernel;
pub use crate::machine::{PhysMemory, Tlb};
pub use crate::page_table::{PageTable, Pid, Ppn, TranslationEntry, Vpn};
pub use crate::process_vm::{ProcessVm, VmFault};
pub use crate::swap_store::{SwapError, SwapStore};
pub use crate::vm_config::{VmConfig, PAGE_SIZE};

pub mod modules;
