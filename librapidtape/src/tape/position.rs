//! Position queries and medium movement.

use log::{debug, warn};
use crate::error::TapeError;
use crate::tape::controller::DriveController;
use crate::tape::drive::{DriveOptions, MAX_PARTITIONS};
use crate::tape::partition::{Boundary, offset};
use crate::tape::transport::{TransportBackend, TransportStatus, Status, PositionMethod, PositionQuery};

impl<'a, T: TransportBackend + ?Sized> DriveController<'a, T> {
    /// Ask the transport where we are.
    ///
    /// Logical positions are preferred; transports that cannot report them
    /// are asked for an absolute one instead. On failure the position becomes
    /// unknown (partition 0, block unknown).
    pub(crate) fn get_pos(&mut self) -> Status {
        let mut res = self.call(|t| t.get_position(PositionQuery::Logical));

        if res == Err(TransportStatus::InvalidFunction) {
            res = self.call(|t| t.get_position(PositionQuery::Absolute));
        }

        match res {
            Ok(pos) => {
                if let Some(partition) = pos.partition {
                    if (partition as usize) < MAX_PARTITIONS {
                        self.drive.partition = partition;
                    } else {
                        warn!("tape{}: partition {} is out of range, staying in {}", self.drive.unit, partition, self.drive.partition);
                    }
                }

                self.drive.block = Some(pos.block);
                Ok(())
            },
            Err(err) => {
                self.drive.partition = 0;
                self.drive.block = None;
                Err(err)
            }
        }
    }

    /// Query the position, reporting the absolute block.
    pub fn tell(&mut self) -> Result<Option<u64>, TapeError> {
        let res = self.get_pos();
        let block = self.drive.block;

        self.finish(res).map(|_| block)
    }

    /// Issue one positioning call to the transport, resolving any
    /// outstanding asynchronous write first.
    pub(crate) fn space(&mut self, method: PositionMethod, count: i64, partition: Option<u32>, immediate: bool) -> Status {
        self.settle_pending_write();

        self.call(|t| t.set_position(method, partition, count, immediate))
    }

    /// Move the medium and update what we know about the position.
    pub fn set_position(&mut self, method: PositionMethod, count: i64) -> Result<(), TapeError> {
        let res = self.set_pos(method, count, false);
        self.finish(res)
    }

    /// Move the medium.
    ///
    /// With `before_mark` set, filemark spacing finishes by stepping back
    /// over the last mark crossed, leaving the medium on the near side of
    /// it.
    pub(crate) fn set_pos(&mut self, method: PositionMethod, count: i64, before_mark: bool) -> Status {
        let mut immediate = false;

        match method {
            PositionMethod::RelativeBlocks | PositionMethod::Filemarks | PositionMethod::Setmarks if count == 0 => return Ok(()),
            PositionMethod::AbsoluteBlock | PositionMethod::LogicalBlock | PositionMethod::Rewind => {
                immediate = self.drive.has_option(DriveOptions::NOWAIT);
            },
            _ => {}
        }

        let forward = count > 0;
        let mut undone = count;
        let mut on_setmark = false;

        let res = if method == PositionMethod::Filemarks {
            //Step one mark at a time so we always know how many marks were
            //crossed before something stopped us.
            let step = count.signum();
            let mut res = Ok(());

            while undone != 0 {
                match self.space(PositionMethod::Filemarks, step, None, false) {
                    Ok(()) => on_setmark = false,
                    Err(TransportStatus::SetmarkDetected) => on_setmark = true,
                    Err(err) => {
                        res = Err(err);
                        break;
                    }
                }

                undone -= step;
            }

            res
        } else {
            self.space(method, count, None, immediate)
        };

        match method {
            PositionMethod::AbsoluteBlock | PositionMethod::LogicalBlock => {
                let _ = self.get_pos();
                self.reset_active();
            },
            PositionMethod::Rewind => {
                if res.is_ok() {
                    self.drive.block = Some(0);
                } else {
                    let _ = self.get_pos();
                }

                self.reset_active();
            },
            PositionMethod::EndOfData => {
                let _ = self.get_pos();
                self.reset_active();

                self.drive.active_mut().boundary = end_boundary(res);
            },
            PositionMethod::Filemarks => match res {
                Ok(()) => {
                    let _ = self.get_pos();
                    let block = self.drive.block;

                    let part = self.drive.active_mut();
                    part.block = block;
                    part.advance_files(count - undone);
                    part.fblock = if forward { Some(0) } else { None };
                    part.setmark = forward && on_setmark;

                    if before_mark {
                        return self.set_pos(PositionMethod::Filemarks, -count.signum(), false);
                    }

                    part.boundary = if forward { Boundary::Filemark } else { Boundary::None };
                },
                Err(err) if err.is_end_of_data() => {
                    let _ = self.get_pos();
                    let block = self.drive.block;

                    let part = self.drive.active_mut();
                    part.block = block;
                    part.advance_files(count - undone);
                    part.fblock = None;
                    part.setmark = false;
                    part.boundary = end_boundary(res);
                },
                Err(err) if err.is_beginning_of_medium() => {
                    self.drive.block = Some(0);
                    self.reset_active();
                },
                Err(_) => {
                    let _ = self.get_pos();
                    self.reset_active();
                }
            },
            PositionMethod::RelativeBlocks => match res {
                Ok(()) => {
                    self.drive.advance_block(count);

                    let part = self.drive.active_mut();
                    part.advance_blocks(count);
                    part.setmark = false;
                    part.boundary = Boundary::None;
                },
                Err(mark) if mark.is_mark() => {
                    let _ = self.get_pos();
                    let block = self.drive.block;

                    let part = self.drive.active_mut();
                    part.block = block;
                    part.advance_files(count.signum());
                    part.fblock = if forward { Some(0) } else { None };
                    part.setmark = forward && mark.is_setmark();
                    part.boundary = if forward { Boundary::Filemark } else { Boundary::None };
                },
                Err(err) if err.is_end_of_data() => {
                    let _ = self.get_pos();
                    let block = self.drive.block;

                    let part = self.drive.active_mut();
                    part.fblock = match (block, part.block) {
                        (Some(now), Some(then)) => offset(Some(0), now as i64 - then as i64),
                        _ => None
                    };
                    part.block = block;
                    part.setmark = false;
                    part.boundary = end_boundary(res);
                },
                Err(err) if err.is_beginning_of_medium() => {
                    self.drive.block = Some(0);
                    self.reset_active();
                },
                Err(_) => {
                    debug!("tape{}: lost track of block position, asking", self.drive.unit);
                    let _ = self.get_pos();
                    self.reset_active();
                }
            },
            PositionMethod::Setmarks => {
                let _ = self.get_pos();
                let block = self.drive.block;

                let part = self.drive.active_mut();
                part.block = block;

                if res.is_ok() {
                    part.file = None;
                    part.fblock = None;
                    part.setmark = true;
                }
            }
        }

        res
    }

    /// Re-establish the active partition at whatever block the drive is at.
    fn reset_active(&mut self) {
        let block = self.drive.block;
        self.drive.active_mut().initialize(block);
    }
}

/// The steady boundary a positioning call that ran out of data leaves
/// behind.
fn end_boundary(res: Status) -> Boundary {
    match res {
        Err(err) if err.is_end_of_medium() => Boundary::EndOfMedium,
        _ => Boundary::EndOfData
    }
}
