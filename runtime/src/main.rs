use byteorder::{BigEndian, WriteBytesExt};
use crumb::{InstructionSet, Number, NumberType, Op, Vm, VmConfig, VERSION};

/// Hand-assemble a small demo program: (2 + 40) as the exit status.
fn demo_program() -> Vec<u8> {
    let set = InstructionSet::new();
    let mut image = Vec::new();

    let mut emit = |op: Op, immediate: Option<Number>| {
        image.push(set.opcode_of(op).expect("op missing from the instruction set"));
        if let Some(ty) = op.immediate_type() {
            let value = immediate.expect("immediate required");
            image
                .write_uint::<BigEndian>(value.to_u64() & ty.bitmask(), ty.size_in_bytes())
                .expect("writing to a Vec cannot fail");
        }
    };

    emit(Op::LoadConst(NumberType::Uint32), Some(Number::Unsigned(2)));
    emit(Op::LoadConst(NumberType::Uint32), Some(Number::Unsigned(40)));
    emit(Op::Add(NumberType::Uint32), None);
    emit(Op::Halt, None);

    image
}

fn main() {
    println!("Crumb stack machine v{}", VERSION);

    let program = demo_program();
    println!("Assembled {} bytes of demo bytecode", program.len());

    let config = VmConfig::default().with_trace(true);
    let mut vm = match Vm::new(program, config) {
        Ok(vm) => vm,
        Err(e) => {
            eprintln!("Failed to initialize the machine: {}", e);
            return;
        }
    };

    match vm.run() {
        Ok(status) => println!("Execution halted with status {}", status),
        Err(e) => eprintln!("Execution faulted: {}", e),
    }
}
