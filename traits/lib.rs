/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Backend-neutral interface between the player core and the media
//! pipeline that does the actual decoding and rendering.

#[macro_use]
extern crate serde_derive;

pub mod bus;
pub mod caps;
pub mod pipeline;
pub mod registry;
pub mod tags;

pub use bus::{BusMessage, BusSender, ElementMessage};
pub use caps::{Caps, CapsValue, Fraction};
pub use pipeline::{
    BackendInit, ColorBalanceChannel, PlayFlag, Pipeline, PipelineError, PipelineFactory, PipelineState,
    SeekRequest, StateChangeError, StateChangeSuccess, StreamKind, VideoSink,
};
pub use registry::{PluginRegistry, Visualization};
pub use tags::{Sample, TagList, TagScope, TagValue};
