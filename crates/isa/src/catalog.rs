//! Built-in SM83 opcode catalog.
//!
//! Cycle counts are machine cycles of the taken path. Where two lines match
//! the same byte the later one wins, which is how `HALT` claims `0x76` from
//! the `LD` block.

pub const CB_PREFIX: u8 = 0xCB;

pub const SM83_PRIMARY: &str = "
00000000 1 NOP
00qq0001 3 LD      #q, v16         @ write: #q; #q := v16
00000010 2 LD      [BC], A         @ read: BC A; [BC] := A
00010010 2 LD      [DE], A         @ read: DE A; [DE] := A
00100010 2 LDI     [HL], A         @ read: HL A; write: HL; [HL] := A; HL := HL +. 1
00110010 2 LDD     [HL], A         @ read: HL A; write: HL; [HL] := A; HL := HL -. 1
00qq0011 2 INC     #q              @ read: #q; write: #q; #q := #q +. 1
00qq1011 2 DEC     #q              @ read: #q; write: #q; #q := #q -. 1
00rrr100 1 INC     #r              @ read: #r; write: #r FZ FN FH; #r := #r + 1; FZ := (#r + 1) == 0; FN := 0
00rrr101 1 DEC     #r              @ read: #r; write: #r FZ FN FH; #r := #r - 1; FZ := #r == 1; FN := 1
00rrr110 2 LD      #r, v8          @ write: #r; #r := v8
00000111 1 RLCA                    @ read: A; write: A FZ FN FH FC; A := (A << 1) | (A >> 7); FC := A >> 7; FZ := 0; FN := 0; FH := 0
00001111 1 RRCA                    @ read: A; write: A FZ FN FH FC; A := (A >> 1) | (A << 7); FC := A & 1; FZ := 0; FN := 0; FH := 0
00010111 1 RLA                     @ read: A FC; write: A FZ FN FH FC; A := (A << 1) | FC; FC := A >> 7; FZ := 0; FN := 0; FH := 0
00011111 1 RRA                     @ read: A FC; write: A FZ FN FH FC; A := (A >> 1) | (FC << 7); FC := A & 1; FZ := 0; FN := 0; FH := 0
00001000 5 LD      [v16], SP       @ read: SP; [v16] := lo(SP); [v16 +. 1] := hi(SP)
00qq1001 2 ADD     HL, #q          @ read: HL #q; write: HL FN FH FC; HL := HL +. #q; FN := 0
00001010 2 LD      A, [BC]         @ read: [BC]; write: A; A := [BC]
00011010 2 LD      A, [DE]         @ read: [DE]; write: A; A := [DE]
00101010 2 LDI     A, [HL]         @ read: [HL]; write: A HL; A := [HL]; HL := HL +. 1
00111010 2 LDD     A, [HL]         @ read: [HL]; write: A HL; A := [HL]; HL := HL -. 1
00010000 1 STOP                    @ sideeffects
00011000 3 JR      v8_rel
001cc000 3 JR      #c, v8_rel      @ read: #c
00100111 1 DAA                     @ read: A FN FH FC; write: A FZ FH FC
00101111 1 CPL                     @ read: A; write: A FN FH; A := A ^ 0xFF; FN := 1; FH := 1
00110111 1 SCF                     @ write: FN FH FC; FC := 1; FN := 0; FH := 0
00111111 1 CCF                     @ read: FC; write: FN FH FC; FC := FC ^ 1; FN := 0; FH := 0
01rrrsss 1 LD      #r, #s          @ read: #s; write: #r; #r := #s
01110110 1 HALT                    @ sideeffects
10000sss 1 ADD     A, #s           @ read: A #s; write: A FZ FN FH FC; A := A + #s; FZ := (A + #s) == 0; FN := 0; FC := c_add(A, #s)
10001sss 1 ADC     A, #s           @ read: A #s FC; write: A FZ FN FH FC; A := A + #s + FC; FZ := (A + #s + FC) == 0; FN := 0
10010sss 1 SUB     A, #s           @ read: A #s; write: A FZ FN FH FC; A := A - #s; FZ := A == #s; FN := 1; FC := c_sub(A, #s)
10011sss 1 SBC     A, #s           @ read: A #s FC; write: A FZ FN FH FC; A := A - #s - FC; FN := 1
10100sss 1 AND     #s              @ read: A #s; write: A FZ FN FH FC; A := A & #s; FZ := (A & #s) == 0; FN := 0; FH := 1; FC := 0
10101sss 1 XOR     #s              @ read: A #s; write: A FZ FN FH FC; A := A ^ #s; FZ := A == #s; FN := 0; FH := 0; FC := 0
10110sss 1 OR      #s              @ read: A #s; write: A FZ FN FH FC; A := A | #s; FZ := (A | #s) == 0; FN := 0; FH := 0; FC := 0
10111sss 1 CP      #s              @ read: A #s; write: FZ FN FH FC; FZ := A == #s; FN := 1; FC := A < #s
110cc000 5 RET     #c              @ read: #c SP; write: SP; SP := SP +. 2
11pp0001 3 POP     #p              @ read: SP; write: #p SP; #p := popval(SP); SP := popst(SP)
110cc010 4 JP      #c, v16         @ read: #c
11000011 4 JP      v16
110cc100 6 CALL    #c, v16         @ read: #c SP; write: SP
11pp0101 4 PUSH    #p              @ read: #p SP; write: SP; SP := push(SP, #p)
11000110 2 ADD     A, v8           @ read: A; write: A FZ FN FH FC; A := A + v8; FZ := (A + v8) == 0; FN := 0; FC := c_add(A, v8)
11001110 2 ADC     A, v8           @ read: A FC; write: A FZ FN FH FC; A := A + v8 + FC; FN := 0
11010110 2 SUB     A, v8           @ read: A; write: A FZ FN FH FC; A := A - v8; FZ := A == v8; FN := 1; FC := c_sub(A, v8)
11011110 2 SBC     A, v8           @ read: A FC; write: A FZ FN FH FC; A := A - v8 - FC; FN := 1
11100110 2 AND     v8              @ read: A; write: A FZ FN FH FC; A := A & v8; FZ := (A & v8) == 0; FN := 0; FH := 1; FC := 0
11101110 2 XOR     v8              @ read: A; write: A FZ FN FH FC; A := A ^ v8; FZ := A == v8; FN := 0; FH := 0; FC := 0
11110110 2 OR      v8              @ read: A; write: A FZ FN FH FC; A := A | v8; FZ := (A | v8) == 0; FN := 0; FH := 0; FC := 0
11111110 2 CP      v8              @ read: A; write: FZ FN FH FC; FZ := A == v8; FN := 1; FC := A < v8
11ttt111 4 RST     #t              @ read: SP; write: SP
11001001 4 RET                     @ read: SP; write: SP; SP := SP +. 2
11011001 4 RETI                    @ read: SP; write: SP IME; SP := SP +. 2; IME := 1
11001101 6 CALL    v16             @ read: SP; write: SP
11100000 3 LD      [FF00_v8], A    @ read: A; [FF00_v8] := A
11110000 3 LD      A, [FF00_v8]    @ read: [FF00_v8]; write: A; A := [FF00_v8]
11100010 2 LD      [0xFF00 +. C], A @ read: A C; [0xFF00 +. C] := A
11110010 2 LD      A, [0xFF00 +. C] @ read: C; write: A; A := [0xFF00 +. C]
11101000 4 ADD     SP, v8          @ read: SP; write: SP FZ FN FH FC; FZ := 0; FN := 0
11101001 1 JP      HL              @ read: HL
11101010 4 LD      [v16], A        @ read: A; [v16] := A
11111010 4 LD      A, [v16]        @ read: [v16]; write: A; A := [v16]
11110011 1 DI                      @ write: IME; IME := 0
11111011 1 EI                      @ write: IME; IME := 1
11111000 3 LD      HL, SP +. v8    @ read: SP; write: HL FZ FN FH FC; FZ := 0; FN := 0
11111001 2 LD      SP, HL          @ read: HL; write: SP; SP := HL
";

/// Second byte of the `CB`-prefixed instructions.
pub const SM83_CB: &str = "
00000rrr 2 RLC     #r              @ read: #r; write: #r FZ FN FH FC; #r := (#r << 1) | (#r >> 7); FC := #r >> 7; FN := 0; FH := 0
00001rrr 2 RRC     #r              @ read: #r; write: #r FZ FN FH FC; #r := (#r >> 1) | (#r << 7); FC := #r & 1; FN := 0; FH := 0
00010rrr 2 RL      #r              @ read: #r FC; write: #r FZ FN FH FC; #r := (#r << 1) | FC; FC := #r >> 7; FN := 0; FH := 0
00011rrr 2 RR      #r              @ read: #r FC; write: #r FZ FN FH FC; #r := (#r >> 1) | (FC << 7); FC := #r & 1; FN := 0; FH := 0
00100rrr 2 SLA     #r              @ read: #r; write: #r FZ FN FH FC; #r := #r << 1; FC := #r >> 7; FZ := (#r << 1) == 0; FN := 0; FH := 0
00101rrr 2 SRA     #r              @ read: #r; write: #r FZ FN FH FC; #r := (#r >> 1) | (#r & 0x80); FC := #r & 1; FN := 0; FH := 0
00110rrr 2 SWAP    #r              @ read: #r; write: #r FZ FN FH FC; #r := (#r << 4) | (#r >> 4); FZ := #r == 0; FN := 0; FH := 0; FC := 0
00111rrr 2 SRL     #r              @ read: #r; write: #r FZ FN FH FC; #r := #r >> 1; FC := #r & 1; FZ := (#r >> 1) == 0; FN := 0; FH := 0
01bbbrrr 2 BIT     #b, #r          @ read: #r; write: FZ FN FH; FZ := (#r & (1 << #b)) == 0; FN := 0; FH := 1
10bbbrrr 2 RES     #b, #r          @ read: #r; write: #r; #r := #r & ((1 << #b) ^ 0xFF)
11bbbrrr 2 SET     #b, #r          @ read: #r; write: #r; #r := #r | (1 << #b)
";
