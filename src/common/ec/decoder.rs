use super::galois::{eval_poly, G};
use super::{Block, MAX_BLOCK_SIZE, MAX_EC_SIZE};
use crate::common::error::{QRError, QRResult};

// Rectifier
//------------------------------------------------------------------------------

impl Block {
    /// Corrects the block in place and returns the number of codewords
    /// fixed, or `Uncorrectable` when more than `ec_len / 2` went bad.
    pub fn rectify(&mut self) -> QRResult<usize> {
        // Compute syndromes
        let synd = match self.syndromes() {
            None => return Ok(0),
            Some(s) => s,
        };

        // Error locator polynomial
        let (sig, errors) = self.berlekamp_massey(&synd);
        if 2 * errors > self.ec_len() {
            return Err(QRError::Uncorrectable);
        }

        // Chien search must account for every root of sigma
        let err_loc = self.chien_search(&sig, errors)?;

        // Sigma derivative, odd terms shifted down one degree
        let mut dsig = [G(0); MAX_EC_SIZE];
        for i in (1..MAX_EC_SIZE).step_by(2) {
            dsig[i - 1] = sig[i];
        }

        // Error evaluator
        let omg = self.omega(&synd, &sig);

        // Error magnitude
        let err_mag = self.forney(&omg, &dsig, &err_loc);

        // Rectify errors by XORing data with magnitude
        for (i, &g) in err_mag.iter().take(self.len).enumerate() {
            self.data[i] = (G(self.data[i]) + g).into();
        }

        match self.syndromes() {
            None => Ok(errors),
            Some(_) => Err(QRError::Uncorrectable),
        }
    }

    // Returns syndromes when any is non-zero, None for a clean block
    fn syndromes(&self) -> Option<[G; MAX_EC_SIZE]> {
        let ec_len = self.ec_len();
        let mut synd = [G(0); MAX_EC_SIZE];

        let mut gdata = [G(0); MAX_BLOCK_SIZE];
        for (i, &b) in self.data.iter().take(self.len).enumerate() {
            gdata[i] = G(b);
        }
        for (i, s) in synd.iter_mut().take(ec_len).enumerate() {
            *s = eval_poly(gdata.iter().take(self.len).rev(), G::gen_pow(i));
        }

        if synd.iter().all(|&s| s.0 == 0) {
            None
        } else {
            Some(synd)
        }
    }

    // Sigma polynomial and its degree
    fn berlekamp_massey(&self, synd: &[G; MAX_EC_SIZE]) -> ([G; MAX_EC_SIZE], usize) {
        let mut l = 0usize;
        let mut m = 1usize;
        let mut b = G(1);
        let mut cx = [G(0); MAX_EC_SIZE];
        let mut bx = [G(0); MAX_EC_SIZE];
        let mut tx = [G(0); MAX_EC_SIZE];
        cx[0] = G(1);
        bx[0] = G(1);
        let deg = self.ec_len();

        for n in 0..deg {
            // Calculate discrepancy
            let mut d = synd[n];
            for i in 1..=l.min(n) {
                d += cx[i] * synd[n - i];
            }

            if d.0 != 0 {
                tx.copy_from_slice(&cx);

                let scale = d / b;
                for i in 0..MAX_EC_SIZE - m {
                    cx[i + m] += scale * bx[i];
                }

                if 2 * l <= n {
                    bx.copy_from_slice(&tx);
                    l = n + 1 - l;
                    b = d;
                    m = 1;
                } else {
                    m += 1;
                }
            } else {
                m += 1;
            }
        }
        (cx, l)
    }

    // Error locations, one flag per codeword position. Fails unless the
    // number of roots matches the locator degree exactly.
    fn chien_search(
        &self,
        sig: &[G; MAX_EC_SIZE],
        errors: usize,
    ) -> QRResult<[bool; MAX_BLOCK_SIZE]> {
        let deg = self.ec_len();
        let mut err_loc = [false; MAX_BLOCK_SIZE];
        let mut roots = 0;
        for (i, e) in err_loc[..self.len].iter_mut().rev().enumerate() {
            *e = eval_poly(sig.iter().take(deg), G::gen_pow(255 - i)).0 == 0;
            roots += *e as usize;
        }

        if roots == errors {
            Ok(err_loc)
        } else {
            Err(QRError::Uncorrectable)
        }
    }

    // Error evaluator polynomial
    fn omega(&self, synd: &[G; MAX_EC_SIZE], sig: &[G; MAX_EC_SIZE]) -> [G; MAX_EC_SIZE] {
        let t = self.ec_len() - 1;
        let mut omg = [G(0); MAX_EC_SIZE];
        for i in 0..t {
            let sy = synd[i + 1];
            for j in 0..t - i {
                omg[i + j] += sy * sig[j];
            }
        }
        omg
    }

    fn forney(
        &self,
        omg: &[G; MAX_EC_SIZE],
        dsig: &[G; MAX_EC_SIZE],
        err_loc: &[bool; MAX_BLOCK_SIZE],
    ) -> [G; MAX_BLOCK_SIZE] {
        let mut mag = [G(0); MAX_BLOCK_SIZE];
        for (i, &is_err) in err_loc.iter().take(self.len).rev().enumerate() {
            if !is_err {
                continue;
            }
            let xinv = G::gen_pow(255 - i);
            let omg_x = eval_poly(omg.iter(), xinv);
            let sig_x = eval_poly(dsig.iter(), xinv);
            mag[self.len - 1 - i] += omg_x / sig_x;
        }
        mag
    }
}


// Rectifier for format and version infos
//------------------------------------------------------------------------------

pub(crate) fn rectify_info(info: u32, valid_numbers: &[u32], err_capacity: u32) -> QRResult<u32> {
    let res = *valid_numbers
        .iter()
        .min_by_key(|&n| (info ^ n).count_ones())
        .expect("Empty info table");

    if (info ^ res).count_ones() <= err_capacity {
        Ok(res)
    } else {
        Err(QRError::Uncorrectable)
    }
}
