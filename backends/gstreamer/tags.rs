//! Conversions between GStreamer tag lists and caps and their
//! engine-neutral counterparts.

use std::str::FromStr;

use mediaplay_traits::{Caps, CapsValue, Fraction, Sample, TagList, TagScope, TagValue};

pub fn tag_list_from_gst(tags: &gst::TagListRef) -> TagList {
    let scope = match tags.scope() {
        gst::TagScope::Global => TagScope::Global,
        _ => TagScope::Stream,
    };
    let mut list = TagList::new(scope);
    for (name, value) in tags.iter() {
        let converted = if let Ok(string) = value.get::<String>() {
            TagValue::Str(string)
        } else if let Ok(number) = value.get::<u32>() {
            TagValue::UInt(number)
        } else if let Ok(sample) = value.get::<gst::Sample>() {
            TagValue::Sample(sample_from_gst(&sample))
        } else {
            trace!("Skipping tag {} of type {}", name, value.type_());
            continue;
        };
        list.insert(name.to_string(), converted);
    }
    list
}

fn sample_from_gst(sample: &gst::Sample) -> Sample {
    let mime = sample
        .caps()
        .and_then(|caps| caps.structure(0))
        .map(|structure| structure.name().to_string());
    let data = sample
        .buffer()
        .and_then(|buffer| buffer.map_readable().ok())
        .map(|map| map.as_slice().to_vec())
        .unwrap_or_default();
    Sample { mime, data }
}

/// The first structure of `caps`. Field types without a neutral
/// representation are dropped.
pub fn caps_from_gst(caps: &gst::CapsRef) -> Option<Caps> {
    let structure = caps.structure(0)?;
    let mut converted = Caps::new(structure.name().to_string());
    for (field, value) in structure.iter() {
        let value = if let Ok(number) = value.get::<i32>() {
            CapsValue::Int(number)
        } else if let Ok(fraction) = value.get::<gst::Fraction>() {
            CapsValue::Fraction(Fraction::new(fraction.numer(), fraction.denom()))
        } else if let Ok(flag) = value.get::<bool>() {
            CapsValue::Bool(flag)
        } else if let Ok(string) = value.get::<String>() {
            CapsValue::Str(string)
        } else {
            continue;
        };
        converted = converted.field(field.to_string(), value);
    }
    Some(converted)
}

pub fn caps_to_gst(caps: &Caps) -> Option<gst::Caps> {
    gst::Caps::from_str(&caps.to_string()).ok()
}
