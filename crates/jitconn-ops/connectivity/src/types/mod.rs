// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # Connectivity Types
//!
//! Value types, dtype tags and the shared error type.

pub mod dtype;
pub mod error;
pub mod numeric;

pub use dtype::DType;
pub use error::{Error, JitConnError, Result};
pub use numeric::KernelFloat;
