//! Driver for the TMP2 temperature Pmod behind an I/O processor.
//!
//! The IOP program polls the mailbox's command cell. Writing an opcode there requests an action,
//! and the IOP clears the cell once a read has completed. Logging runs in the background on the
//! IOP and is never acknowledged.

use core::{convert::Infallible, fmt::Write};

use embedded_hal::blocking::delay::DelayUs;
use fugit::MicrosDurationU32;

use crate::{
    decode::reg_to_float,
    error::{Error, Result},
    iop::{Iop, IopAllocator, Slot, PROGRAM},
    log::{LogDump, LogWindow},
    mailbox::{Command, Mmio, COMMAND, DATA, LOG_END_PTR, LOG_INTERVAL},
    thermometer::{Temperature, Thermometer},
};

/// Time between command cell polls in [`Tmp2::read_timeout`]
const POLL_INTERVAL_US: u32 = 10;

pub struct Tmp2<I> {
    iop: I,
    log_ms: u32,
    raw: u32,
}

impl<I: Iop> Tmp2<I> {
    /// Binds a TMP2 to `slot` and starts its IOP
    pub fn new<A>(allocator: &mut A, slot: Slot) -> Result<Self>
    where
        A: IopAllocator<Iop = I>,
    {
        let iop = allocator.request(slot, PROGRAM).map_err(|e| {
            warn!("Failed to allocate IOP on slot {}: {}", slot.id(), e.as_str());
            Error::from(e)
        })?;
        info!("TMP2 bound to slot {}", slot.id());
        Ok(Self::from_iop(iop))
    }

    /// Takes an IOP that already runs [`PROGRAM`] and starts it
    pub fn from_iop(mut iop: I) -> Self {
        iop.start();
        Self {
            iop,
            log_ms: 0,
            raw: 0,
        }
    }

    /// Gives back the IOP. The sensor keeps whatever logging state it had.
    pub fn release(self) -> I {
        self.iop
    }

    pub fn iop(&self) -> &I {
        &self.iop
    }
    pub fn iop_mut(&mut self) -> &mut I {
        &mut self.iop
    }

    fn command(&mut self, cmd: Command) {
        trace!("TMP2 command: {}", cmd.opcode());
        self.iop.mmio().write(COMMAND, cmd.opcode());
    }

    /// Reads the current temperature.
    ///
    /// Spins until the IOP acknowledges the command. If the IOP never does, this never returns;
    /// use [`Tmp2::read_timeout`] when that matters.
    #[cfg_attr(feature = "sizing", inline(never))]
    pub fn read(&mut self) -> Temperature {
        self.start_read();
        match nb::block!(self.poll_read()) {
            Ok(temp) => temp,
            Err(e) => match e {},
        }
    }

    /// Asks the IOP for a reading. Complete it with [`Tmp2::poll_read`].
    pub fn start_read(&mut self) {
        self.command(Command::Read);
    }

    /// Returns the reading requested by [`Tmp2::start_read`] once the IOP has taken it
    pub fn poll_read(&mut self) -> nb::Result<Temperature, Infallible> {
        let mmio = self.iop.mmio();
        if mmio.read(COMMAND) == Command::Read.opcode() {
            return Err(nb::Error::WouldBlock);
        }

        self.raw = mmio.read(DATA);
        let temp = reg_to_float(self.raw);
        debug!("TMP2 raw: {=u32:#x}, temperature: {=f64}", self.raw, temp);
        Ok(temp)
    }

    /// Like [`Tmp2::read`], but gives up after `timeout`.
    ///
    /// On timeout the command stays in the mailbox, so the IOP may still answer it later.
    pub fn read_timeout(
        &mut self,
        delay: &mut impl DelayUs<u32>,
        timeout: MicrosDurationU32,
    ) -> Result<Temperature> {
        let mut retries = timeout.to_micros() / POLL_INTERVAL_US;

        self.start_read();
        loop {
            match self.poll_read() {
                Ok(temp) => return Ok(temp),
                Err(nb::Error::WouldBlock) => {}
                Err(nb::Error::Other(e)) => match e {},
            }

            if retries == 0 {
                warn!("TMP2 read timed out after {=u32} us", timeout.to_micros());
                return Err(Error::Timeout);
            }
            retries -= 1;
            delay.delay_us(POLL_INTERVAL_US);
        }
    }

    /// Raw data register of the last completed read
    pub const fn last_raw(&self) -> u32 {
        self.raw
    }

    /// Temperature of the last completed read
    pub fn last_temperature(&self) -> Temperature {
        reg_to_float(self.raw)
    }

    /// Sets how long the IOP logs for, in milliseconds
    pub fn set_log_interval(&mut self, ms: i32) -> Result<()> {
        let Ok(ms) = u32::try_from(ms) else {
            warn!("Rejected negative log interval: {=i32}", ms);
            return Err(Error::InvalidArgument);
        };

        self.log_ms = ms;
        self.iop.mmio().write(LOG_INTERVAL, ms);
        Ok(())
    }

    pub const fn log_interval(&self) -> u32 {
        self.log_ms
    }

    /// Starts logging readings on the IOP. Pass 0 to log without a time limit.
    pub fn start_log(&mut self, ms: i32) -> Result<()> {
        self.set_log_interval(ms)?;
        self.command(Command::StartLog);
        Ok(())
    }

    pub fn stop_log(&mut self) {
        self.command(Command::StopLog);
    }

    /// Stops logging and returns the logged readings, oldest first
    pub fn log(&mut self) -> LogDump<'_, I::Mmio> {
        self.stop_log();

        let mmio = self.iop.mmio();
        let window = LogWindow::from_end_ptr(mmio.read(LOG_END_PTR));
        debug!("TMP2 log: {=usize} entries from slot {=usize}", window.count, window.start);

        LogDump::new(mmio, window)
    }

    /// Stops logging and prints the log as a `T\tData` table
    pub fn write_log<W: Write>(&mut self, w: &mut W) -> core::fmt::Result {
        w.write_str("T\tData\n")?;
        for entry in self.log() {
            writeln!(w, "{}\t{:.1}", entry.index, entry.temperature)?;
        }
        Ok(())
    }
}

impl<I: Iop> Thermometer for Tmp2<I> {
    type Error = Infallible;

    fn read(&mut self) -> core::result::Result<Temperature, Self::Error> {
        Ok(Tmp2::read(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::AllocationError,
        fake::{FakeAllocator, FakeIop, NoopDelay, IDLE},
        mailbox::log_entry,
    };

    const TWENTY_FIVE: u32 = 0x41C8_0000;

    fn driver() -> Tmp2<FakeIop> {
        let mut tmp2 = Tmp2::from_iop(FakeIop::new());
        tmp2.iop_mut().mailbox.clear_history();
        tmp2
    }

    #[test]
    fn new_starts_iop() {
        let mut alloc = FakeAllocator::new();
        let tmp2 = Tmp2::new(&mut alloc, Slot::Jb).unwrap();

        assert!(tmp2.iop().started);
        assert!(alloc.is_bound(Slot::Jb));
        assert_eq!(tmp2.log_interval(), 0);
        assert_eq!(tmp2.iop().mailbox.writes().count(), 0);
    }

    #[test]
    fn new_fails_on_bound_slot() {
        let mut alloc = FakeAllocator::new();
        let _first = Tmp2::new(&mut alloc, Slot::Jc).unwrap();

        let second = Tmp2::new(&mut alloc, Slot::Jc);
        assert!(matches!(
            second,
            Err(Error::Allocation(AllocationError::SlotInUse))
        ));

        assert!(Tmp2::new(&mut alloc, Slot::Jd).is_ok());
    }

    #[test]
    fn new_fails_on_program_load() {
        let mut alloc = FakeAllocator::new();
        alloc.fail_load = true;

        let res = Tmp2::new(&mut alloc, Slot::Je);
        assert!(matches!(
            res,
            Err(Error::Allocation(AllocationError::ProgramLoad))
        ));
        assert!(!alloc.is_bound(Slot::Je));
    }

    #[test]
    fn read_polls_until_cleared() {
        let mut tmp2 = driver();
        tmp2.iop_mut().mailbox.set_reading(TWENTY_FIVE);
        tmp2.iop_mut().mailbox.set_latency(5);

        assert_eq!(tmp2.read(), 25.0);

        let mailbox = &tmp2.iop().mailbox;
        assert_eq!(mailbox.commands().collect::<Vec<_>>(), [3]);
        assert_eq!(mailbox.polls(), 6);
        assert_eq!(mailbox.peek(COMMAND), IDLE);
        assert_eq!(tmp2.last_raw(), TWENTY_FIVE);
        assert_eq!(tmp2.last_temperature(), 25.0);
    }

    #[test]
    fn read_returns_latest_data() {
        let mut tmp2 = driver();

        tmp2.iop_mut().mailbox.set_reading((-12.5f32).to_bits());
        assert_eq!(tmp2.read(), -12.5);

        tmp2.iop_mut().mailbox.set_reading(30.04f32.to_bits());
        assert_eq!(Thermometer::read(&mut tmp2), Ok(30.0));
        assert_eq!(tmp2.iop().mailbox.commands().collect::<Vec<_>>(), [3, 3]);
    }

    #[test]
    fn poll_read_would_block_while_busy() {
        let mut tmp2 = driver();
        tmp2.iop_mut().mailbox.set_reading(TWENTY_FIVE);
        tmp2.iop_mut().mailbox.set_latency(1);

        tmp2.start_read();
        assert_eq!(tmp2.poll_read(), Err(nb::Error::WouldBlock));
        assert_eq!(tmp2.poll_read(), Ok(25.0));
    }

    #[test]
    fn read_timeout_gives_up_on_stalled_iop() {
        let mut tmp2 = driver();
        tmp2.iop_mut().mailbox.set_stalled(true);
        let mut delay = NoopDelay::default();

        let res = tmp2.read_timeout(&mut delay, MicrosDurationU32::micros(100));
        assert_eq!(res, Err(Error::Timeout));
        assert_eq!(delay.waited_us, 100);
        assert_eq!(tmp2.iop().mailbox.polls(), 11);
        assert_eq!(
            tmp2.iop().mailbox.peek(COMMAND),
            Command::Read.opcode()
        );
    }

    #[test]
    fn read_timeout_returns_reading() {
        let mut tmp2 = driver();
        tmp2.iop_mut().mailbox.set_reading(TWENTY_FIVE);
        tmp2.iop_mut().mailbox.set_latency(3);
        let mut delay = NoopDelay::default();

        let res = tmp2.read_timeout(&mut delay, MicrosDurationU32::millis(1));
        assert_eq!(res, Ok(25.0));
        assert_eq!(delay.waited_us, 3 * POLL_INTERVAL_US);
    }

    #[test]
    fn negative_log_interval_is_rejected() {
        let mut tmp2 = driver();
        tmp2.set_log_interval(250).unwrap();
        tmp2.iop_mut().mailbox.clear_history();

        assert_eq!(tmp2.set_log_interval(-1), Err(Error::InvalidArgument));
        assert_eq!(tmp2.log_interval(), 250);
        assert_eq!(tmp2.iop().mailbox.writes().count(), 0);
        assert_eq!(tmp2.iop().mailbox.peek(LOG_INTERVAL), 250);
    }

    #[test]
    fn log_interval_is_written() {
        let mut tmp2 = driver();

        tmp2.set_log_interval(0).unwrap();
        tmp2.set_log_interval(1500).unwrap();

        assert_eq!(tmp2.log_interval(), 1500);
        assert_eq!(
            tmp2.iop().mailbox.writes().collect::<Vec<_>>(),
            [(LOG_INTERVAL, 0), (LOG_INTERVAL, 1500)]
        );
    }

    #[test]
    fn start_then_stop_log() {
        let mut tmp2 = driver();

        tmp2.start_log(100).unwrap();
        tmp2.stop_log();

        assert_eq!(
            tmp2.iop().mailbox.writes().collect::<Vec<_>>(),
            [(LOG_INTERVAL, 100), (COMMAND, 7), (COMMAND, 1)]
        );
        assert_eq!(tmp2.iop().mailbox.polls(), 0);
    }

    #[test]
    fn start_log_rejects_negative_interval() {
        let mut tmp2 = driver();

        assert_eq!(tmp2.start_log(-5), Err(Error::InvalidArgument));
        assert_eq!(tmp2.iop().mailbox.writes().count(), 0);
    }

    #[test]
    fn unwrapped_log() {
        let mut tmp2 = driver();
        let mailbox = &mut tmp2.iop_mut().mailbox;
        mailbox.poke(LOG_END_PTR, 500);
        for slot in 0..500 {
            mailbox.poke(log_entry(slot), (slot as f32).to_bits());
        }

        let dump = tmp2.log();
        assert_eq!(dump.len(), 500);
        assert_eq!(dump.window().start, 0);

        for (i, entry) in dump.enumerate() {
            assert_eq!(entry.index, i);
            assert_eq!(entry.raw, (i as f32).to_bits());
        }
        assert_eq!(tmp2.iop().mailbox.commands().collect::<Vec<_>>(), [1]);
    }

    #[test]
    fn wrapped_log() {
        let mut tmp2 = driver();
        let mailbox = &mut tmp2.iop_mut().mailbox;
        mailbox.poke(LOG_END_PTR, 1200);
        for slot in 0..1000 {
            mailbox.poke(log_entry(slot), slot as u32);
        }

        let dump = tmp2.log();
        assert_eq!(dump.len(), 1000);

        let raws: Vec<_> = dump.map(|e| (e.index, e.raw)).collect();
        assert_eq!(raws.len(), 1000);
        assert_eq!(raws[0], (0, 200));
        assert_eq!(raws[799], (799, 999));
        assert_eq!(raws[800], (800, 0));
        assert_eq!(raws[999], (999, 199));
    }

    #[test]
    fn write_log_table() {
        let mut tmp2 = driver();
        let mailbox = &mut tmp2.iop_mut().mailbox;
        mailbox.poke(LOG_END_PTR, 3);
        mailbox.poke(log_entry(0), TWENTY_FIVE);
        mailbox.poke(log_entry(1), 0);
        mailbox.poke(log_entry(2), (-4.3f32).to_bits());

        let mut out = String::new();
        tmp2.write_log(&mut out).unwrap();

        assert_eq!(out, "T\tData\n0\t25.0\n1\t0.0\n2\t-4.3\n");
    }

    #[test]
    fn mapped_iop_writes_through() {
        use core::cell::Cell;

        use crate::{
            iop::MappedIop,
            mailbox::{VolatileMmio, IOP_MMIO_REGSIZE, WORD},
        };

        let mut window = vec![0u32; IOP_MMIO_REGSIZE / WORD];
        let started = Cell::new(false);
        let mmio = unsafe { VolatileMmio::new(window.as_mut_ptr(), IOP_MMIO_REGSIZE) };

        let mut tmp2 = Tmp2::from_iop(MappedIop::new(mmio, || started.set(true)));
        tmp2.start_log(42).unwrap();
        drop(tmp2);

        assert!(started.get());
        assert_eq!(window[LOG_INTERVAL / WORD], 42);
        assert_eq!(window[COMMAND / WORD], 7);
    }

    #[test]
    fn release_returns_iop() {
        let mut tmp2 = driver();
        tmp2.stop_log();

        let iop = tmp2.release();
        assert!(iop.started);
        assert_eq!(iop.mailbox.commands().collect::<Vec<_>>(), [1]);
    }
}
