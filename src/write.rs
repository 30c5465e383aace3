//! The outbound half of a connection: serializes `Frame`s to the wire,
//! masking them when this side's role requires it.

use crate::error::Error;
use crate::frame::{self, Frame};
use crate::mask;
use crate::state::Role;
use crate::stream::SocketFlowStream;
use rand::rngs::StdRng;
use tokio::io::{AsyncWriteExt, WriteHalf};

pub struct Writer {
    write_half: WriteHalf<SocketFlowStream>,
    role: Role,
    rng: StdRng,
}

impl Writer {
    pub fn new(write_half: WriteHalf<SocketFlowStream>, role: Role) -> Self {
        Self {
            write_half,
            role,
            rng: mask::new_rng(),
        }
    }

    /// Serializes and writes one frame. Clients mask every outbound frame
    /// with a freshly generated key; servers never do.
    pub async fn write_frame(&mut self, frame: Frame) -> Result<(), Error> {
        let mask_key = if self.role.masks_outbound() {
            Some(mask::random_mask_key(&mut self.rng))
        } else {
            None
        };

        let mut header = Vec::with_capacity(14);
        frame::write_header(&mut header, frame.fin, frame.opcode, frame.payload.len(), mask_key);
        self.write_half.write_all(&header).await?;

        match mask_key {
            Some(key) => {
                let mut payload = frame.payload;
                mask::apply_mask(&mut payload, key, 0);
                self.write_half.write_all(&payload).await?;
            }
            None => {
                self.write_half.write_all(&frame.payload).await?;
            }
        }

        self.write_half.flush().await?;
        Ok(())
    }
}
