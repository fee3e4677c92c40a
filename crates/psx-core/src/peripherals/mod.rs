//! Hardware devices behind the I/O window and the composite router that
//! fans accesses out to them.

/// CD-ROM controller.
pub mod cdrom;
/// DMA controller.
pub mod dma;
/// GPU command front end.
pub mod gpu;
/// Interrupt controller.
pub mod interrupt;
/// Plain register storage.
pub mod register_block;
/// Controller and serial ports.
pub mod sio;
/// SPU registers.
pub mod spu;
/// Root counters.
pub mod timers;

use crate::api::{BusDevice, CoreConfig};
use cdrom::Cdrom;
use dma::Dma;
use gpu::Gpu;
use interrupt::InterruptController;
use register_block::RegisterBlock;
use sio::SerialPorts;
use spu::Spu;
use timers::Timers;

/// Every device in the `0x1F80_1000..0x1F80_3000` window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IoPorts {
    /// Memory control 1.
    pub memory_control: RegisterBlock,
    /// Pad/memory card and serial ports.
    pub sio: SerialPorts,
    /// Memory control 2.
    pub ram_size: RegisterBlock,
    /// `I_STAT`/`I_MASK`.
    pub interrupts: InterruptController,
    /// DMA controller.
    pub dma: Dma,
    /// Root counters.
    pub timers: Timers,
    /// CD-ROM controller.
    pub cdrom: Cdrom,
    /// GPU.
    pub gpu: Gpu,
    /// MDEC registers.
    pub mdec: RegisterBlock,
    /// SPU registers.
    pub spu: Spu,
    /// Expansion region 2.
    pub expansion2: RegisterBlock,
}

impl IoPorts {
    /// Creates every device in its reset state.
    #[must_use]
    pub fn new(config: &CoreConfig) -> Self {
        Self {
            memory_control: RegisterBlock::memory_control(),
            sio: SerialPorts::new(),
            ram_size: RegisterBlock::ram_size(),
            interrupts: InterruptController::new(),
            dma: Dma::new(),
            timers: Timers::new(),
            cdrom: Cdrom::new(config.cdrom_ack_delay_ticks, config.cdrom_sector_delay_ticks),
            gpu: Gpu::new(config.vblank_interval_ticks),
            mdec: RegisterBlock::mdec(),
            spu: Spu::new(),
            expansion2: RegisterBlock::expansion2(),
        }
    }

    /// Returns the device claiming physical address `addr`, if any.
    pub fn device_mut(&mut self, addr: u32) -> Option<&mut dyn BusDevice> {
        let devices: [&mut dyn BusDevice; 11] = [
            &mut self.memory_control,
            &mut self.sio,
            &mut self.ram_size,
            &mut self.interrupts,
            &mut self.dma,
            &mut self.timers,
            &mut self.cdrom,
            &mut self.gpu,
            &mut self.mdec,
            &mut self.spu,
            &mut self.expansion2,
        ];
        devices
            .into_iter()
            .find(|device| device.is_address_for_device(addr))
    }

    /// Advances every device by one tick, routing their interrupt requests.
    pub fn tick(&mut self) {
        let irq = &mut self.interrupts;
        self.gpu.tick(irq);
        self.cdrom.tick(irq);
        self.dma.tick(irq);
        self.timers.tick(irq);
    }
}

#[cfg(test)]
mod tests {
    use super::IoPorts;
    use crate::api::CoreConfig;
    use rstest::rstest;

    #[rstest]
    #[case(0x1F80_1000)]
    #[case(0x1F80_1044)]
    #[case(0x1F80_1060)]
    #[case(0x1F80_1070)]
    #[case(0x1F80_10F4)]
    #[case(0x1F80_1120)]
    #[case(0x1F80_1803)]
    #[case(0x1F80_1814)]
    #[case(0x1F80_1824)]
    #[case(0x1F80_1DAE)]
    #[case(0x1F80_2041)]
    fn every_documented_register_is_claimed(#[case] addr: u32) {
        let mut io = IoPorts::new(&CoreConfig::default());
        assert!(io.device_mut(addr).is_some(), "{addr:#010x}");
    }

    #[rstest]
    #[case(0x1F80_1024)]
    #[case(0x1F80_1064)]
    #[case(0x1F80_1078)]
    #[case(0x1F80_1130)]
    #[case(0x1F80_1804)]
    #[case(0x1F80_1818)]
    #[case(0x1F80_1828)]
    fn gaps_between_devices_are_unclaimed(#[case] addr: u32) {
        let mut io = IoPorts::new(&CoreConfig::default());
        assert!(io.device_mut(addr).is_none(), "{addr:#010x}");
    }

    #[test]
    fn tick_forwards_vblank_to_interrupt_controller() {
        let config = CoreConfig {
            vblank_interval_ticks: 2,
            ..CoreConfig::default()
        };
        let mut io = IoPorts::new(&config);
        io.tick();
        io.tick();
        assert_eq!(io.interrupts.status() & 1, 1);
    }
}
