pub(crate) use decode::*;

// Reader for encoded data
//------------------------------------------------------------------------------

mod reader {
    use std::cmp::min;

    use crate::common::codec::types::{
        ECI_MODE_INDICATOR, KANJI_MODE_INDICATOR, STRUCTURED_APPEND_INDICATOR, TERMINATOR,
    };
    use crate::common::codec::Mode;
    use crate::common::error::{QRError, QRResult};
    use crate::common::metadata::Version;
    use crate::common::BitStream;

    pub(super) enum Token {
        Data(Vec<u8>),
        Eci(u32),
        End,
    }

    pub(super) fn take_token(inp: &mut BitStream, ver: Version) -> QRResult<Token> {
        let indicator = match inp.take_bits(4) {
            // Stream exhausted without an explicit terminator; happens when
            // the data fills capacity to within 4 bits
            None => return Ok(Token::End),
            Some(TERMINATOR) => return Ok(Token::End),
            Some(ind) => ind,
        };

        let mode = match indicator {
            0b0001 => Mode::Numeric,
            0b0010 => Mode::Alphanumeric,
            0b0100 => Mode::Byte,
            ECI_MODE_INDICATOR => return take_eci(inp).map(Token::Eci),
            KANJI_MODE_INDICATOR | STRUCTURED_APPEND_INDICATOR => {
                return Err(QRError::UnsupportedMode)
            }
            _ => return Err(QRError::UnsupportedMode),
        };

        let len_bits = ver.char_cnt_bits(mode);
        let char_cnt = inp.take_bits(len_bits).ok_or(QRError::PrematureEndOfBits)? as usize;

        let data = match mode {
            Mode::Numeric => take_numeric_data(inp, char_cnt)?,
            Mode::Alphanumeric => take_alphanumeric_data(inp, char_cnt)?,
            Mode::Byte => take_byte_data(inp, char_cnt)?,
        };
        Ok(Token::Data(data))
    }

    fn take_eci(inp: &mut BitStream) -> QRResult<u32> {
        let first = inp.take_bits(8).ok_or(QRError::PrematureEndOfBits)? as u32;
        if first & 0b1000_0000 == 0 {
            // 0xxxxxxx: the byte is the assignment
            Ok(first)
        } else if first & 0b0100_0000 == 0 {
            // 10xxxxxx xxxxxxxx
            let rest = inp.take_bits(8).ok_or(QRError::PrematureEndOfBits)? as u32;
            Ok((first & 0b0011_1111) << 8 | rest)
        } else if first & 0b0010_0000 == 0 {
            // 110xxxxx xxxxxxxx xxxxxxxx
            let rest = inp.take_bits(16).ok_or(QRError::PrematureEndOfBits)? as u32;
            Ok((first & 0b0001_1111) << 16 | rest)
        } else {
            Err(QRError::UnsupportedMode)
        }
    }

    fn take_numeric_data(inp: &mut BitStream, mut char_cnt: usize) -> QRResult<Vec<u8>> {
        let mut res = Vec::with_capacity(char_cnt);
        while char_cnt > 0 {
            let bit_len = if char_cnt > 2 { 10 } else { (char_cnt % 3) * 3 + 1 };
            let chunk = inp.take_bits(bit_len).ok_or(QRError::PrematureEndOfBits)?;
            res.extend(Mode::Numeric.decode_chunk(chunk, bit_len));
            char_cnt -= min(3, char_cnt);
        }
        Ok(res)
    }

    fn take_alphanumeric_data(inp: &mut BitStream, mut char_cnt: usize) -> QRResult<Vec<u8>> {
        let mut res = Vec::with_capacity(char_cnt);
        while char_cnt > 0 {
            let bit_len = if char_cnt > 1 { 11 } else { 6 };
            let chunk = inp.take_bits(bit_len).ok_or(QRError::PrematureEndOfBits)?;
            res.extend(Mode::Alphanumeric.decode_chunk(chunk, bit_len));
            char_cnt -= min(2, char_cnt);
        }
        Ok(res)
    }

    fn take_byte_data(inp: &mut BitStream, mut char_cnt: usize) -> QRResult<Vec<u8>> {
        let mut res = Vec::with_capacity(char_cnt);
        while char_cnt > 0 {
            let chunk = inp.take_bits(8).ok_or(QRError::PrematureEndOfBits)?;
            res.extend(Mode::Byte.decode_chunk(chunk, 8));
            char_cnt -= 1;
        }
        Ok(res)
    }

    #[cfg(test)]
    mod reader_tests {
        use super::{take_token, Token};
        use crate::common::codec::encoder::encode_with_version;
        use crate::common::metadata::{ECLevel, Version};

        fn expect_data(t: Token) -> Vec<u8> {
            match t {
                Token::Data(d) => d,
                _ => panic!("Expected a data segment"),
            }
        }

        #[test]
        fn test_take_segments() {
            let data = "abcABCDEF1234567890123ABCDEFabc".as_bytes();
            let ver = Version::new(2);
            let mut bs = encode_with_version(data, ver, ECLevel::L, None).unwrap();
            assert_eq!(expect_data(take_token(&mut bs, ver).unwrap()), b"abc");
            assert_eq!(expect_data(take_token(&mut bs, ver).unwrap()), b"ABCDEF");
            assert_eq!(expect_data(take_token(&mut bs, ver).unwrap()), b"1234567890123");
            assert_eq!(expect_data(take_token(&mut bs, ver).unwrap()), b"ABCDEF");
            assert_eq!(expect_data(take_token(&mut bs, ver).unwrap()), b"abc");
            assert!(matches!(take_token(&mut bs, ver).unwrap(), Token::End));
        }

        #[test]
        fn test_take_eci_then_data() {
            let data = "\u{dc}".as_bytes();
            let ver = Version::new(1);
            let mut bs = encode_with_version(data, ver, ECLevel::M, Some(26)).unwrap();
            match take_token(&mut bs, ver).unwrap() {
                Token::Eci(a) => assert_eq!(a, 26),
                _ => panic!("Expected an ECI header"),
            }
            assert_eq!(expect_data(take_token(&mut bs, ver).unwrap()), data);
        }

        #[test]
        fn test_kanji_rejected() {
            use crate::common::BitStream;
            let mut bs = BitStream::new(32);
            bs.push_bits(0b1000, 4);
            bs.push_bits(0u8, 8);
            assert!(take_token(&mut bs, Version::new(1)).is_err());
        }

        #[test]
        fn test_premature_end() {
            use crate::common::BitStream;
            let mut bs = BitStream::new(32);
            // Byte mode claiming 200 chars with no data behind it
            bs.push_bits(0b0100, 4);
            bs.push_bits(200u8, 8);
            assert!(take_token(&mut bs, Version::new(1)).is_err());
        }
    }
}

// Decoder
//------------------------------------------------------------------------------

mod decode {
    use super::reader::{take_token, Token};
    use crate::common::error::QRResult;
    use crate::common::metadata::Version;
    use crate::common::BitStream;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(crate) struct DecodedPayload {
        pub bytes: Vec<u8>,
        pub eci: Option<u32>,
    }

    pub(crate) fn decode(encoded: &mut BitStream, ver: Version) -> QRResult<DecodedPayload> {
        let mut bytes = Vec::with_capacity(encoded.len() >> 3);
        let mut eci = None;
        loop {
            match take_token(encoded, ver)? {
                Token::Data(d) => bytes.extend(d),
                Token::Eci(a) => eci = Some(a),
                Token::End => break,
            }
        }
        Ok(DecodedPayload { bytes, eci })
    }

}
