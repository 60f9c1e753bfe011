// SPDX-FileCopyrightText: © 2024 Phala Network <dstack@phala.network>
//
// SPDX-License-Identifier: Apache-2.0

//! Measurement logs of a confidential VM: the boot-time event log and the IMA
//! runtime log.

pub use boot::{BootEvent, BootEventLog};
pub use ima::{
    parse_runtime_log, read_runtime_log, ImaRecord, MalformedRecord, RuntimeLog,
    IMA_RUNTIME_MEASUREMENTS_FILE,
};

mod boot;
pub mod ima;
