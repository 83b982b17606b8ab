// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! A real channel backend over a POSIX message queue, opened `O_NONBLOCK`
//! for sending so a full peer queue fails fast rather than blocking the
//! caller's thread (see [`ChannelTraits::has_non_blocking_guarantee`]).

use std::ffi::CString;
use std::io;
use std::sync::Arc;

use nix::mqueue::{mq_close, mq_open, mq_receive, mq_send, mq_unlink, MQ_OFlag, MqAttr, MqdT};
use nix::sys::stat::Mode;

use super::{validate_identifier, ChannelTraits, ReceivedEnvelope, Uid};
use crate::codec::{
    decode_medium, decode_short, encode_medium, encode_short, MEDIUM_ENVELOPE_LEN,
    SHORT_ENVELOPE_LEN,
};
use crate::error::Error;
use crate::message::{MediumMessage, ShortMessage};

/// Sentinel buffer a [`MqueueChannel::stop_receive`] sends to unblock one
/// worker's in-flight `mq_receive`; shorter than any real envelope, so it can
/// never be confused with a [`ShortMessage`] or [`MediumMessage`].
const STOP_SENTINEL: [u8; 1] = [0u8];

const MAX_QUEUED_DEFAULT: i64 = 10;

#[derive(Clone)]
pub struct MqueueHandle {
    mqd: Arc<MqdT>,
}

fn to_cstring(identifier: &str) -> CString {
    CString::new(identifier).expect("identifier must not contain interior NUL bytes")
}

/// Marker type implementing [`ChannelTraits`] over `nix::mqueue`.
pub struct MqueueChannel;

impl ChannelTraits for MqueueChannel {
    type Handle = MqueueHandle;

    fn open_receiver(identifier: &str, allowed_uids: &[Uid], max_queued_messages: i32) -> Result<Self::Handle, Error> {
        validate_identifier(identifier)?;
        // A POSIX mqueue only ever grants access by owner/group/world mode
        // bits, never per connecting uid; the mode below is already
        // owner-only. The one thing actually checkable at this layer is
        // whether the caller's own uid is even in the list it's asking us to
        // enforce - if it isn't, the receiver could never be reached by
        // anyone the mode bits let through, so the configuration is rejected
        // up front instead of silently creating an unreachable queue.
        let caller_uid = unsafe { libc::getuid() };
        if !allowed_uids.is_empty() && !allowed_uids.contains(&caller_uid) {
            return Err(Error::PermissionDenied);
        }
        let name = to_cstring(identifier);
        let attr = MqAttr::new(
            0,
            i64::from(max_queued_messages).max(1).min(MAX_QUEUED_DEFAULT),
            MEDIUM_ENVELOPE_LEN as i64,
            0,
        );
        let mqd = mq_open(
            &name,
            MQ_OFlag::O_CREAT | MQ_OFlag::O_RDONLY,
            Mode::S_IRUSR | Mode::S_IWUSR,
            Some(&attr),
        )?;
        Ok(MqueueHandle { mqd: Arc::new(mqd) })
    }

    fn close_receiver(handle: &Self::Handle, identifier: &str) {
        let _ = mq_close(&*handle.mqd);
        let name = to_cstring(identifier);
        let _ = mq_unlink(&name);
    }

    fn stop_receive(handle: &Self::Handle) {
        let _ = mq_send(&*handle.mqd, &STOP_SENTINEL, 0);
    }

    fn receive_next(handle: &Self::Handle) -> Result<ReceivedEnvelope, Error> {
        let mut buf = [0u8; MEDIUM_ENVELOPE_LEN];
        let received = mq_receive(&*handle.mqd, &mut buf, &mut 0)?;
        match received {
            1 => Ok(ReceivedEnvelope::Stop),
            SHORT_ENVELOPE_LEN => decode_short(&buf[..received]).map(ReceivedEnvelope::Short),
            MEDIUM_ENVELOPE_LEN => decode_medium(&buf[..received]).map(ReceivedEnvelope::Medium),
            _ => Err(Error::MalformedEnvelope),
        }
    }

    fn try_open_sender(identifier: &str) -> Result<Self::Handle, Error> {
        validate_identifier(identifier)?;
        let name = to_cstring(identifier);
        let mqd = mq_open(&name, MQ_OFlag::O_WRONLY | MQ_OFlag::O_NONBLOCK, Mode::empty(), None)
            .map_err(|e| Error::Io(io::Error::from(e)))?;
        Ok(MqueueHandle { mqd: Arc::new(mqd) })
    }

    fn close_sender(handle: &Self::Handle) {
        let _ = mq_close(&*handle.mqd);
    }

    fn try_send_short(handle: &Self::Handle, message: ShortMessage) -> Result<(), Error> {
        let buf = encode_short(message);
        mq_send(&*handle.mqd, &buf, 0).map_err(Error::from)
    }

    fn try_send_medium(handle: &Self::Handle, message: MediumMessage) -> Result<(), Error> {
        let buf = encode_medium(message);
        mq_send(&*handle.mqd, &buf, 0).map_err(Error::from)
    }

    fn has_non_blocking_guarantee() -> bool {
        true
    }
}

