use rasm16::{
    asm::{
        assembler::{AddressUnit, Assembler, AssemblerOptions, Resolution},
        AsmError,
    },
    diag::Recorder,
    emu::{registers::Flags, Cpu, EmuError, Exit},
    plat::{Register16, Register8, CODE_BASE, STACK_BASE},
};

const BYTES: AssemblerOptions = AssemblerOptions {
    resolution: Resolution::SinglePass,
    address_unit: AddressUnit::Bytes,
};

fn assemble(source: &str, options: AssemblerOptions) -> Result<Vec<u8>, AsmError> {
    Assembler::new(options, Recorder::new())
        .assemble_source(source)
        .map(|a| a.image)
}

fn run(source: &str, options: AssemblerOptions) -> Cpu<Recorder> {
    let image = assemble(source, options).unwrap();
    let mut cpu = Cpu::new(Recorder::new());
    cpu.load_image(&image).unwrap();
    assert_eq!(cpu.run_until_halt(), Ok(Exit::Halted));
    cpu
}

#[test]
fn loads_equal_immediates() {
    let cpu = run("LR0 82\nLR1 82\nHLT\n", AssemblerOptions::default());
    assert_eq!(cpu.registers.get16(Register16::R0), 82);
    assert_eq!(cpu.registers.get16(Register16::R1), 82);
    // only EQU touches the equal flag
    assert!(!cpu.flags.contains(Flags::EQUAL));
    assert_eq!(cpu.registers.pc, CODE_BASE + 7);
}

#[test]
fn add_sets_flags_at_the_boundaries() {
    let cases = [
        (65535, 1, 0, Flags::ZERO | Flags::CARRY),
        (32767, 1, 0x8000, Flags::SIGN | Flags::OVERFLOW),
        (32768, 32768, 0, Flags::ZERO | Flags::CARRY | Flags::OVERFLOW),
        (2, 3, 5, Flags::empty()),
    ];
    for (a, b, sum, flags) in cases {
        let cpu = run(
            &format!("LR0 {a} LR1 {b} ADD R2 R0 R1 HLT"),
            AssemblerOptions::default(),
        );
        assert_eq!(cpu.registers.get16(Register16::R2), sum, "{a} + {b}");
        assert_eq!(cpu.flags, flags, "{a} + {b}");
    }
}

#[test]
fn stack_is_last_in_first_out() {
    let cpu = run(
        "PUSH WORD 4660 PUSH BYTE 7 POP BYTE B2 POP WORD R3 HLT",
        AssemblerOptions::default(),
    );
    assert_eq!(cpu.registers.get16(Register16::R3), 4660);
    assert_eq!(cpu.registers.get8(Register8::B2), 7);
    assert_eq!(cpu.registers.sp, STACK_BASE);
    let sp = usize::from(STACK_BASE);
    assert!(cpu.memory()[sp..sp + 3].iter().all(|b| *b == 0));
}

#[test]
fn store_then_load_through_memory() {
    let cpu = run(
        "LR3 256 LR1 43981 STW R3 R1 LDW R0 R3 LB0 9 STB R3 B0 LDB B1 R3 HLT",
        AssemblerOptions::default(),
    );
    assert_eq!(cpu.registers.get16(Register16::R0), 43981);
    assert_eq!(cpu.registers.get8(Register8::B1), 9);
    assert_eq!(&cpu.memory()[0x100..0x102], &[9, 0xAB]);
}

#[test]
fn counting_loop_with_byte_addresses() {
    let source = "
        LR1 1
        LR2 5
    loop:
        ADD R0 R0 R1
        EQU R0 R2
        JZ loop
        HLT
    ";
    let cpu = run(source, BYTES);
    assert_eq!(cpu.registers.get16(Register16::R0), 5);
    assert!(cpu.flags.contains(Flags::EQUAL));
    // 2 loads + 5 * (ADD + EQU + JZ) + HLT
    assert_eq!(cpu.cycles(), 2 * 2 + 5 * (4 + 3 + 2) + 1);
}

#[test]
fn forward_jump_needs_two_passes() {
    let source = "JMP skip LR0 1 skip: HLT";
    assert!(matches!(
        assemble(source, BYTES),
        Err(AsmError::UndefinedLabel { name, .. }) if name == "skip"
    ));

    let cpu = run(
        source,
        AssemblerOptions {
            resolution: Resolution::TwoPass,
            address_unit: AddressUnit::Bytes,
        },
    );
    assert_eq!(cpu.registers.get16(Register16::R0), 0);
    assert_eq!(cpu.registers.pc, CODE_BASE + 7);
}

#[test]
fn budget_resumes_and_halt_sticks() {
    let image = assemble("LR0 1 LR1 2 LR2 3 HLT", AssemblerOptions::default()).unwrap();
    let mut cpu = Cpu::new(Recorder::new());
    cpu.load_image(&image).unwrap();
    assert_eq!(cpu.execute(4), Ok(Exit::BudgetExhausted));
    assert_eq!(cpu.registers.get16(Register16::R1), 2);
    assert_eq!(cpu.registers.get16(Register16::R2), 0);
    assert_eq!(cpu.execute(100), Ok(Exit::Halted));
    let before = (cpu.registers().clone(), cpu.flags());
    assert_eq!(cpu.execute(100), Ok(Exit::Halted));
    assert_eq!((cpu.registers().clone(), cpu.flags()), before);
    assert_eq!(cpu.cycles(), 7);
}

#[test]
fn division_by_zero_is_fatal() {
    let image = assemble("LR0 10 DIV R2 R0 R1 HLT", AssemblerOptions::default()).unwrap();
    let mut cpu = Cpu::new(Recorder::new());
    cpu.load_image(&image).unwrap();
    assert_eq!(
        cpu.run_until_halt(),
        Err(EmuError::DivisionByZero {
            address: CODE_BASE + 3
        })
    );
    assert!(!cpu.is_halted());
}
